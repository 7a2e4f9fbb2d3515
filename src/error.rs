//! Errors that originate inside `sahc` or `httparse`.
//!
//! The client facade and the execution pipeline report failures as an [`Error`]. Every kind of
//! failure maps to exactly one variant, and every variant is reported only after any connection
//! that was leased for the request has been handed back to the connection manager.
//!
//! Failures on the wire are carried as [`std::io::Error`], as the socket reports them. Errors
//! caused by the server closing its socket prematurely are reported as
//! [`std::io::ErrorKind::UnexpectedEof`]. Errors caused by the server sending an invalid or
//! unsupported HTTP response are reported as [`std::io::ErrorKind::InvalidData`]; if the
//! `detailed-errors` feature is enabled, then the inner error of the [`std::io::Error`] is an
//! [`InvalidData`] instance, otherwise there is no source.

use crate::route::Scheme;
use std::path::PathBuf;

/// The error type returned by the client facade and the execution pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// A required input was absent. No side effects took place.
	#[error("{0} may not be absent")]
	InvalidArgument(&'static str),

	/// No connection could be leased for the request’s route. Nothing was held, so nothing was
	/// released.
	#[error("unable to lease a connection: {0}")]
	Connectivity(#[from] ConnectError),

	/// The wire exchange failed. The held connection was discarded before this was reported.
	///
	/// This variant is produced by the execution pipeline; the client facade translates it into
	/// [`ClientProtocol`](Self::ClientProtocol).
	#[error("protocol exchange failed: {0}")]
	Protocol(#[source] ProtocolError),

	/// The wire exchange failed, as surfaced by the client facade.
	#[error("client protocol failure: {0}")]
	ClientProtocol(#[source] ProtocolError),

	/// A file used as a request body does not exist or cannot be read.
	#[error("cannot read {}: {source}", path.display())]
	FileNotFound {
		/// The path that was opened.
		path: PathBuf,

		/// The underlying failure.
		#[source]
		source: std::io::Error,
	},

	/// A legacy connection-manager operation that this client does not support.
	#[error("{0} is not supported")]
	UnsupportedOperation(&'static str),

	/// The request was aborted through its [`AbortHandle`](crate::AbortHandle).
	#[error("request aborted")]
	Cancelled,
}

/// The ways in which leasing a connection can fail.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
	/// The connection manager has been shut down.
	#[error("connection manager has been shut down")]
	Shutdown,

	/// No connection became available within the connection request timeout.
	#[error("timed out waiting for a connection")]
	Timeout,

	/// The connection manager cannot open connections for the route’s scheme.
	#[error("scheme {0} is not supported")]
	UnsupportedScheme(Scheme),

	/// Opening the connection failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// The ways in which the wire exchange can fail.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
	/// The request method cannot be sent by this client.
	#[error("request method {0} is not supported")]
	UnsupportedMethod(http::Method),

	/// Reading from or writing to the connection failed, or the server sent an invalid response.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// The ways in which a received `Content-Length` header can be invalid.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum BadContentLength {
	/// The header is not valid UTF-8.
	#[error(transparent)]
	NotUtf8(std::str::Utf8Error),

	/// The header is not a nonnegative integer or does not fit into a `u64`.
	#[error(transparent)]
	NotU64(<u64 as std::str::FromStr>::Err),
}

/// The ways in which a chunk header can be invalid.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum BadChunkHeader {
	/// A byte in the chunk size is not a hex digit.
	#[error("Chunk size is not a hex number")]
	SizeNotHex,

	/// The size does not fit in a `u64`.
	#[error("Chunk size is too large")]
	SizeNotU64,

	/// A character in the chunk header extensions section was not permitted to appear there.
	#[error("Chunk extensions contains invalid character")]
	ExtChar,

	/// A newline character (CR or LF) was not present where required, either after the chunk
	/// header, after a chunk’s data, or after the blank line following the end marker.
	#[error("Chunk framing contains incorrect newlines")]
	Newline,
}

/// The type of nested error included in any error of kind
/// [`InvalidData`](std::io::ErrorKind::InvalidData) that originates within `sahc` itself.
///
/// Errors that pass through `sahc` but do not originate there, such as errors returned by the
/// underlying connection, may be of kind [`InvalidData`](std::io::ErrorKind::InvalidData) but not
/// contain a nested error object of this type.
///
/// The nested error is included only if the `detailed-errors` feature is enabled.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum InvalidData {
	/// An error occurred during parsing headers.
	#[error(transparent)]
	ParseHeaders(#[from] httparse::Error),

	/// The response headers are too long.
	#[error("Response headers too long")]
	ResponseHeadersTooLong,

	/// A response header name or value cannot be represented.
	#[error("Response header {0:?} is invalid")]
	BadHeader(String),

	/// The server decided to switch protocols. This is not supported.
	#[error("Unsupported 101 Switching Protocols received")]
	SwitchingProtocols,

	/// The server sent both a `Content-Length` header and a `Transfer-Encoding` header.
	#[error("Content-Length and Transfer-Encoding both received")]
	ContentLengthAndTransferEncoding,

	/// The server sent a `Content-Length` header with a 204 No Content status code.
	#[error("Content-Length received in 204 No Content response")]
	ContentLengthWithNoContent,

	/// The server sent multiple `Content-Length` headers.
	#[error("Multiple Content-Length headers received")]
	MultipleContentLengths,

	/// The server sent an invalid `Content-Length` header.
	#[error("Invalid Content-Length header received: {0}")]
	BadContentLength(#[from] BadContentLength),

	/// The server sent a `Transfer-Encoding` header with a 204 No Content status code.
	#[error("Transfer-Encoding received in 204 No Content response")]
	TransferEncodingWithNoContent,

	/// The server sent multiple `Transfer-Encoding` headers.
	#[error("Multiple Transfer-Encoding headers received")]
	MultipleTransferEncodings,

	/// The server sent a `Transfer-Encoding` header with an encoding other than `chunked`.
	#[error("Unsupported Transfer-Encoding received")]
	NotChunked,

	/// The server sent an invalid chunk header.
	#[error("Invalid chunk header received: {0}")]
	BadChunkHeader(#[from] BadChunkHeader),
}

impl From<InvalidData> for std::io::Error {
	#[cfg(feature = "detailed-errors")]
	fn from(inner: InvalidData) -> Self {
		Self::new(std::io::ErrorKind::InvalidData, inner)
	}

	#[cfg(not(feature = "detailed-errors"))]
	fn from(_: InvalidData) -> Self {
		std::io::ErrorKind::InvalidData.into()
	}
}

impl From<BadContentLength> for std::io::Error {
	fn from(inner: BadContentLength) -> Self {
		Into::<InvalidData>::into(inner).into()
	}
}

impl From<BadChunkHeader> for std::io::Error {
	fn from(inner: BadChunkHeader) -> Self {
		Into::<InvalidData>::into(inner).into()
	}
}
