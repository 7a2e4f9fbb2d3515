mod body;
mod headers;

pub use body::Body as ResponseBody;
pub(crate) use headers::receive as receive_head;

use http::{HeaderMap, StatusCode, Version};
use std::io::Read;

/// How the length of a response body is determined.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Framing {
	/// The body is exactly this many bytes long. Responses that cannot carry a body (replies to
	/// `HEAD`, 204 and 304) have length zero.
	Length(u64),

	/// The body uses chunked transfer coding.
	Chunked,

	/// The body ends when the server closes the connection.
	UntilClose,
}

/// An HTTP status line and response headers.
#[derive(Clone, Debug)]
pub struct ResponseHead {
	/// The HTTP version.
	pub version: Version,

	/// The status code.
	pub status: StatusCode,

	/// The reason phrase.
	pub reason: String,

	/// The response headers.
	pub headers: HeaderMap,

	/// How the body that follows the head is delimited.
	pub framing: Framing,
}

impl ResponseHead {
	/// Returns whether the head is followed by body bytes on the connection.
	#[must_use]
	pub fn has_body(&self) -> bool {
		self.framing != Framing::Length(0)
	}
}

/// A response returned by the client.
///
/// The body is read from the connection the request was sent over. That connection stays out of
/// the connection manager’s hands until the body has been read to its end, at which point it is
/// released for reuse (if the reuse strategy allowed it). Closing or dropping a response whose
/// body has not been read to its end discards the connection instead.
#[derive(Debug)]
pub struct Response {
	/// The status line and headers.
	head: ResponseHead,

	/// The body.
	body: ResponseBody,
}

impl Response {
	pub(crate) fn new(head: ResponseHead, body: ResponseBody) -> Self {
		Self { head, body }
	}

	/// Returns the status line and headers.
	#[must_use]
	pub fn head(&self) -> &ResponseHead {
		&self.head
	}

	/// Returns the HTTP version.
	#[must_use]
	pub fn version(&self) -> Version {
		self.head.version
	}

	/// Returns the status code.
	#[must_use]
	pub fn status(&self) -> StatusCode {
		self.head.status
	}

	/// Returns the response headers.
	#[must_use]
	pub fn headers(&self) -> &HeaderMap {
		&self.head.headers
	}

	/// Returns the body.
	pub fn body(&mut self) -> &mut ResponseBody {
		&mut self.body
	}

	/// Splits the response into its head and body.
	#[must_use]
	pub fn into_parts(self) -> (ResponseHead, ResponseBody) {
		(self.head, self.body)
	}

	/// Closes the response.
	///
	/// If the body was read to its end the connection has already been released and this does
	/// nothing; otherwise the connection is discarded.
	pub fn close(mut self) {
		self.body.close();
	}
}

impl Read for Response {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		self.body.read(buf)
	}
}
