use std::io::{BufRead, Result};

/// A response body that ends when the underlying socket is closed by the server.
#[derive(Debug)]
pub(super) struct Receive {
	/// Whether the server has closed the connection.
	done: bool,
}

impl Receive {
	pub(super) fn new() -> Self {
		Self { done: false }
	}

	pub(super) fn is_complete(&self) -> bool {
		self.done
	}

	pub(super) fn read<R: BufRead + ?Sized>(
		&mut self,
		socket: &mut R,
		buf: &mut [u8],
	) -> Result<usize> {
		if self.done {
			return Ok(0);
		}
		let bytes_read = socket.read(buf)?;
		if bytes_read == 0 {
			self.done = true;
		}
		Ok(bytes_read)
	}
}
