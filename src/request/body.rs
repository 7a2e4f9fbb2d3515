mod chunked;
mod fixed;

use std::io::{Result, Write};

/// The framing of a request body.
enum Mode<'socket> {
	/// The request body has a fixed size given by a `Content-Length` header, which is zero when
	/// the request has no body.
	Fixed(fixed::Send<'socket>),

	/// The request body is encoded using chunked transfer coding.
	Chunked(chunked::Send<'socket>),
}

/// An in-progress HTTP request which is currently sending a request body.
///
/// After the head is sent, an instance of this type is obtained. It implements [`Write`], which
/// is used to write the request body. When the body is finished (or immediately, if there is no
/// body), `finish` must be called to terminate it.
pub(crate) struct BodyWriter<'socket> {
	inner: Mode<'socket>,
}

impl<'socket> BodyWriter<'socket> {
	/// Constructs a writer for a body of exactly `length` bytes.
	pub(crate) fn new_fixed(socket: &'socket mut dyn Write, length: u64) -> Self {
		Self {
			inner: Mode::Fixed(fixed::Send::new(socket, length)),
		}
	}

	/// Constructs a writer for a body using chunked transfer coding.
	pub(crate) fn new_chunked(socket: &'socket mut dyn Write) -> Self {
		Self {
			inner: Mode::Chunked(chunked::Send::new(socket)),
		}
	}

	/// Gives a hint that at least `length` more bytes of body will be written.
	///
	/// For a chunked body this sets the size of the next chunk; for a fixed-length body it does
	/// nothing.
	pub(crate) fn hint_length(&mut self, length: u64) {
		match &mut self.inner {
			Mode::Fixed(_) => (),
			Mode::Chunked(inner) => inner.hint_length(length),
		}
	}

	/// Finishes the body.
	///
	/// This function does not flush the socket.
	///
	/// # Errors
	/// This function returns an error if writing to the socket fails, or if a fixed-length body
	/// was not fully written.
	pub(crate) fn finish(self) -> Result<()> {
		match self.inner {
			Mode::Fixed(inner) => inner.finish(),
			Mode::Chunked(inner) => inner.finish(),
		}
	}
}

impl Write for BodyWriter<'_> {
	fn write(&mut self, buf: &[u8]) -> Result<usize> {
		match &mut self.inner {
			Mode::Fixed(inner) => inner.write(buf),
			Mode::Chunked(inner) => inner.write(buf),
		}
	}

	fn flush(&mut self) -> Result<()> {
		match &mut self.inner {
			Mode::Fixed(inner) => inner.flush(),
			Mode::Chunked(inner) => inner.flush(),
		}
	}
}
