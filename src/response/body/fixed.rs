use std::io::{BufRead, ErrorKind, Result};

/// A response body that is a fixed length known a priori from a `Content-Length` header.
#[derive(Debug)]
pub(super) struct Receive {
	/// The amount of body left for the caller to receive.
	remaining: u64,
}

impl Receive {
	/// Constructs a new `Receive` for a body of `length` bytes.
	pub(super) fn new(length: u64) -> Self {
		Self { remaining: length }
	}

	/// Returns `true` if the entire response body has been received.
	pub(super) fn is_complete(&self) -> bool {
		self.remaining == 0
	}

	/// Reads body bytes from `socket` into `buf`, never reading past the end of the body.
	pub(super) fn read<R: BufRead + ?Sized>(
		&mut self,
		socket: &mut R,
		buf: &mut [u8],
	) -> Result<usize> {
		if self.remaining == 0 {
			return Ok(0);
		}
		let to_read = std::cmp::min(buf.len() as u64, self.remaining) as usize;
		let bytes_read = socket.read(&mut buf[..to_read])?;
		if bytes_read == 0 {
			Err(ErrorKind::UnexpectedEof.into())
		} else {
			self.remaining -= bytes_read as u64;
			Ok(bytes_read)
		}
	}
}
