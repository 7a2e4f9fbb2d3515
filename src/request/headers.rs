use super::BodyWriter;
use http::header::{CONTENT_LENGTH, TE, TRANSFER_ENCODING, UPGRADE};
use http::{HeaderMap, Method};
use std::io::{Result, Write};

/// Sends an HTTP request line and request headers.
///
/// The `method` parameter holds the method for the request. The `request_target` parameter holds
/// the “request target”, which is the path and query string of the URI in origin form. The
/// `headers` parameter holds the request headers to send. The `socket` parameter is the connection
/// over which the HTTP request will be sent; it should provide write buffering for good
/// performance.
///
/// This function returns once the head has been written to `socket`. The return value is a
/// [`BodyWriter`] that is used to write the request body, if any, framed according to the
/// `Transfer-Encoding` or `Content-Length` header.
///
/// This function does not flush the socket.
///
/// # Errors
/// This function returns an error if writing to `socket` fails.
///
/// # Panics
/// This function panics under any of the following conditions, in a debug build:
/// * if the request method is `CONNECT` (this method is not supported)
/// * if the request target contains characters outside the range 0x21 to 0x7E
/// * if the `Transfer-Encoding` header is present and is set to any value other than `chunked`
/// * if the `Content-Length` header is present and is not a non-negative 64-bit integer
/// * if more than one of `Transfer-Encoding` and `Content-Length` headers is present
/// * if the `Upgrade` or `TE` header is present
///
/// These are debug-build panics, not errors, because the exchange builds the framing headers
/// itself; an inconsistency among them is a bug in this crate.
pub(crate) fn send<'socket>(
	method: &Method,
	request_target: &str,
	headers: &HeaderMap,
	socket: &'socket mut dyn Write,
) -> Result<BodyWriter<'socket>> {
	debug_assert!(
		method != Method::CONNECT,
		"Request method CONNECT is not supported"
	);
	debug_assert!(
		crate::util::is_request_target(request_target),
		"Request target contains invalid characters"
	);
	debug_assert!(
		!headers.contains_key(TE),
		"Request header TE is not supported"
	);
	debug_assert!(
		!headers.contains_key(UPGRADE),
		"Request header Upgrade is not supported"
	);
	debug_assert!(
		headers.get_all(CONTENT_LENGTH).iter().count()
			+ headers.get_all(TRANSFER_ENCODING).iter().count()
			<= 1,
		"Request must contain at most one of Content-Length and Transfer-Encoding"
	);

	// Send the request line.
	write!(socket, "{method} {request_target} HTTP/1.1\r\n")?;

	// Send the headers.
	for (name, value) in headers {
		socket.write_all(name.as_str().as_bytes())?;
		socket.write_all(b": ")?;
		socket.write_all(value.as_bytes())?;
		socket.write_all(b"\r\n")?;
	}

	// Send the blank line.
	socket.write_all(b"\r\n")?;

	if let Some(value) = headers.get(TRANSFER_ENCODING) {
		debug_assert!(
			value == "chunked",
			"Request Transfer-Encoding is {value:?}, but only chunked is supported"
		);
		Ok(BodyWriter::new_chunked(socket))
	} else {
		let length = headers
			.get(CONTENT_LENGTH)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.parse::<u64>().ok());
		debug_assert!(
			length.is_some() || !headers.contains_key(CONTENT_LENGTH),
			"Request Content-Length is not a non-negative integer"
		);
		Ok(BodyWriter::new_fixed(socket, length.unwrap_or(0)))
	}
}
