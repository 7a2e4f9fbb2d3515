mod chunked;
mod eof;
mod fixed;

use super::Framing;
use crate::conn::ConnectionHolder;
use std::io::{BufRead, ErrorKind, Read, Result};

/// The decoder for the framing in use.
#[derive(Debug)]
enum Impl {
	Chunked(chunked::Receive),
	Eof(eof::Receive),
	Fixed(fixed::Receive),
}

impl Impl {
	fn read<R: BufRead + ?Sized>(&mut self, socket: &mut R, buf: &mut [u8]) -> Result<usize> {
		match self {
			Self::Chunked(chunked) => chunked.read(socket, buf),
			Self::Eof(eof) => eof.read(socket, buf),
			Self::Fixed(fixed) => fixed.read(socket, buf),
		}
	}

	fn is_complete(&self) -> bool {
		match self {
			Self::Chunked(chunked) => chunked.is_complete(),
			Self::Eof(eof) => eof.is_complete(),
			Self::Fixed(fixed) => fixed.is_complete(),
		}
	}
}

/// A response body being received from the connection it arrived on.
///
/// The body implements [`Read`]. When the decoder reaches the end of the body, the connection is
/// released to its manager with the disposition recorded by the reuse decision; a body that ends
/// at connection close is never released for reuse. A read error discards the connection, as does
/// closing or dropping the body before its end.
#[derive(Debug)]
pub struct Body {
	/// The body decoding implementation.
	body_impl: Impl,

	/// The connection the body is read from, until it is released.
	holder: Option<ConnectionHolder>,
}

impl Body {
	/// Constructs a body that has no bytes and holds no connection.
	pub(crate) fn empty() -> Self {
		Self {
			body_impl: Impl::Fixed(fixed::Receive::new(0)),
			holder: None,
		}
	}

	/// Constructs a body read from the connection in `holder`, delimited by `framing`.
	pub(crate) fn streamed(framing: Framing, holder: ConnectionHolder) -> Self {
		let body_impl = match framing {
			Framing::Length(n) => Impl::Fixed(fixed::Receive::new(n)),
			Framing::Chunked => Impl::Chunked(chunked::Receive::new()),
			Framing::UntilClose => Impl::Eof(eof::Receive::new()),
		};
		Self {
			body_impl,
			holder: Some(holder),
		}
	}

	/// Returns whether the whole body has been received.
	#[must_use]
	pub fn is_complete(&self) -> bool {
		self.body_impl.is_complete()
	}

	/// Reads and throws away the rest of the body, so that the connection can be reused.
	///
	/// Returns the number of bytes discarded.
	///
	/// # Errors
	/// This function returns an error if reading the body fails.
	pub fn drain(&mut self) -> Result<u64> {
		std::io::copy(self, &mut std::io::sink())
	}

	/// Gives up on the rest of the body.
	///
	/// If the body was already read to its end this does nothing; otherwise the connection is
	/// discarded and further reads fail.
	pub fn close(&mut self) {
		if let Some(mut holder) = self.holder.take() {
			holder.abort_connection();
		}
	}

	/// Releases the connection once the decoder has seen the end of the body.
	fn end_of_body(&mut self) {
		if let Some(mut holder) = self.holder.take() {
			if matches!(self.body_impl, Impl::Eof(_)) {
				holder.mark_non_reusable();
			}
			holder.release_connection();
		}
	}
}

impl Read for Body {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		if buf.is_empty() {
			return Ok(0);
		}
		let holder = match self.holder.as_mut() {
			Some(holder) => holder,
			None if self.body_impl.is_complete() => return Ok(0),
			None => return Err(ErrorKind::NotConnected.into()),
		};
		let result = holder
			.connection()
			.and_then(|connection| self.body_impl.read(connection, buf));
		match result {
			Ok(0) => {
				self.end_of_body();
				Ok(0)
			}
			Ok(n) => {
				if self.body_impl.is_complete() {
					self.end_of_body();
				}
				Ok(n)
			}
			Err(e) => {
				self.close();
				Err(e)
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::conn::{ConnectionHolder, Disposition};
	use crate::util::mock::{MockConnection, RecordingManager};
	use std::sync::Arc;
	use std::time::Duration;

	fn holder(manager: &Arc<RecordingManager>, input: &[u8]) -> ConnectionHolder {
		let mut holder = ConnectionHolder::new(
			manager.clone(),
			Box::new(MockConnection::new(input.to_vec())),
		);
		holder.mark_reusable(Some(Duration::from_secs(1)));
		holder
	}

	/// Tests that a fixed-length body releases its connection as soon as the last byte is read.
	#[test]
	fn test_fixed_releases_on_last_byte() {
		let manager = Arc::new(RecordingManager::new());
		let mut body = Body::streamed(Framing::Length(5), holder(&manager, b"HelloNEXT"));
		let mut buffer = [0_u8; 5];
		body.read_exact(&mut buffer).unwrap();
		assert_eq!(&buffer, b"Hello");
		assert!(body.is_complete());
		assert_eq!(
			manager.releases(),
			vec![Disposition::Reusable {
				valid_for: Some(Duration::from_secs(1))
			}]
		);
		assert_eq!(body.read(&mut buffer).unwrap(), 0);
		drop(body);
		assert_eq!(manager.releases().len(), 1);
	}

	/// Tests that a chunked body releases its connection at the terminal chunk.
	#[test]
	fn test_chunked_releases_at_end() {
		let manager = Arc::new(RecordingManager::new());
		let mut body = Body::streamed(
			Framing::Chunked,
			holder(&manager, b"6\r\nHello \r\n6\r\nWorld!\r\n0\r\n\r\n"),
		);
		let mut output = Vec::new();
		let _ = body.read_to_end(&mut output).unwrap();
		assert_eq!(output, b"Hello World!");
		assert_eq!(manager.releases().len(), 1);
		assert!(matches!(
			manager.releases()[0],
			Disposition::Reusable { .. }
		));
	}

	/// Tests that a body delimited by connection close never releases its connection for reuse.
	#[test]
	fn test_until_close_discards() {
		let manager = Arc::new(RecordingManager::new());
		let mut body = Body::streamed(Framing::UntilClose, holder(&manager, b"abc"));
		assert_eq!(body.drain().unwrap(), 3);
		assert_eq!(manager.releases(), vec![Disposition::Discard]);
	}

	/// Tests that closing a body before its end discards the connection, exactly once.
	#[test]
	fn test_close_early() {
		let manager = Arc::new(RecordingManager::new());
		let mut body = Body::streamed(Framing::Length(10), holder(&manager, b"abcdefghij"));
		let mut buffer = [0_u8; 4];
		assert_eq!(body.read(&mut buffer).unwrap(), 4);
		body.close();
		body.close();
		assert_eq!(
			body.read(&mut buffer).unwrap_err().kind(),
			ErrorKind::NotConnected
		);
		drop(body);
		assert_eq!(manager.releases(), vec![Disposition::Discard]);
	}

	/// Tests that a truncated body discards the connection.
	#[test]
	fn test_read_error_discards() {
		let manager = Arc::new(RecordingManager::new());
		let mut body = Body::streamed(Framing::Length(10), holder(&manager, b"abc"));
		assert_eq!(body.drain().unwrap_err().kind(), ErrorKind::UnexpectedEof);
		assert_eq!(manager.releases(), vec![Disposition::Discard]);
	}

	/// Tests that an empty body reads as empty.
	#[test]
	fn test_empty() {
		let mut body = Body::empty();
		assert!(body.is_complete());
		assert_eq!(body.drain().unwrap(), 0);
	}
}
