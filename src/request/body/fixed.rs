use std::io::{ErrorKind, Result, Write};

/// A request body of a fixed length given by a `Content-Length` header.
pub(super) struct Send<'socket> {
	/// The underlying socket.
	socket: &'socket mut dyn Write,

	/// How many bytes of body are left to send.
	remaining: u64,
}

impl<'socket> Send<'socket> {
	/// Constructs a new `Send` that sends `length` bytes of body over `socket`.
	pub(super) fn new(socket: &'socket mut dyn Write, length: u64) -> Self {
		Self {
			socket,
			remaining: length,
		}
	}

	/// Finishes the body.
	///
	/// # Errors
	/// This function returns an error of kind [`InvalidInput`](ErrorKind::InvalidInput) if fewer
	/// bytes were written than the declared length.
	pub(super) fn finish(self) -> Result<()> {
		if self.remaining == 0 {
			Ok(())
		} else {
			Err(std::io::Error::new(
				ErrorKind::InvalidInput,
				format!("request body ended {} bytes short of its Content-Length", self.remaining),
			))
		}
	}
}

impl Write for Send<'_> {
	fn write(&mut self, buf: &[u8]) -> Result<usize> {
		if buf.len() as u64 > self.remaining {
			return Err(std::io::Error::new(
				ErrorKind::InvalidInput,
				format!(
					"attempted to write {} bytes, but Content-Length indicates only {} should be left to send",
					buf.len(),
					self.remaining
				),
			));
		}
		let bytes_written = self.socket.write(buf)?;
		self.remaining -= bytes_written as u64;
		Ok(bytes_written)
	}

	fn flush(&mut self) -> Result<()> {
		self.socket.flush()
	}
}
