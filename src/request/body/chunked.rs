use std::cmp::max;
use std::io::{Result, Write};

/// A request body encoded using chunked transfer coding.
pub(super) struct Send<'socket> {
	/// The underlying socket.
	socket: &'socket mut dyn Write,

	/// The number of bytes left to send in the current chunk.
	chunk_bytes_left: u64,

	/// The length of the next chunk after the current one, if known.
	next_chunk_size: Option<u64>,
}

impl<'socket> Send<'socket> {
	pub(super) fn new(socket: &'socket mut dyn Write) -> Self {
		Self {
			socket,
			chunk_bytes_left: 0,
			next_chunk_size: None,
		}
	}

	/// Gives a hint that at least `length` more bytes of body will be sent.
	///
	/// This sets the size of the next chunk, so that a large chunk can be written in several
	/// smaller pieces without each piece becoming its own chunk.
	pub(super) fn hint_length(&mut self, length: u64) {
		// A chunk in progress must be finished first, so only the excess applies to the next one.
		if length > self.chunk_bytes_left {
			let new_hint = length - self.chunk_bytes_left;
			self.next_chunk_size = Some(self.next_chunk_size.map_or(new_hint, |v| max(v, new_hint)));
		}
	}

	/// Sends the terminal chunk.
	///
	/// # Panics
	/// This function panics in a debug build if the most recent chunk was not fully sent.
	pub(super) fn finish(self) -> Result<()> {
		debug_assert!(self.chunk_bytes_left == 0);
		self.socket.write_all(b"0\r\n\r\n")
	}
}

impl Write for Send<'_> {
	fn write(&mut self, buf: &[u8]) -> Result<usize> {
		if buf.is_empty() {
			return Ok(0);
		}

		// Start a chunk if we’re not currently inside one.
		if self.chunk_bytes_left == 0 {
			let chunk_size = self
				.next_chunk_size
				.take()
				.map_or(buf.len() as u64, |v| max(v, buf.len() as u64));
			write!(self.socket, "{chunk_size:X}\r\n")?;
			self.chunk_bytes_left = chunk_size;
		}

		let to_write = std::cmp::min(buf.len() as u64, self.chunk_bytes_left) as usize;
		let bytes_written = self.socket.write(&buf[..to_write])?;
		self.chunk_bytes_left -= bytes_written as u64;
		if self.chunk_bytes_left == 0 && bytes_written != 0 {
			self.socket.write_all(b"\r\n")?;
		}
		Ok(bytes_written)
	}

	fn flush(&mut self) -> Result<()> {
		self.socket.flush()
	}
}
