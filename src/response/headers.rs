use super::{Framing, ResponseHead};
use crate::error::{BadContentLength, InvalidData};
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, StatusCode, Version};
use std::io::{BufRead, ErrorKind, Result};

/// The largest status line plus headers that will be accepted, in bytes.
const MAX_HEAD_LENGTH: usize = 64 * 1024;

/// The largest number of response headers that will be accepted.
const MAX_HEADERS: usize = 128;

/// Receives an HTTP status line and response headers.
///
/// The `socket` parameter is the connection over which the HTTP response will be received. The
/// `head` parameter indicates whether the request was a `HEAD` request, whose response never has
/// a body. Informational (1xx) responses are skipped. On return, `socket` is positioned at the
/// first byte of the response body, if any.
///
/// # Errors
/// This function returns an error if reading from `socket` fails, or one of kind
/// [`UnexpectedEof`](ErrorKind::UnexpectedEof) if the connection closes before the headers end.
///
/// This function returns an error of kind [`InvalidData`](ErrorKind::InvalidData) under the
/// following conditions:
/// * if the response status line or headers are malformed
/// * if the response status line and headers are too large
/// * if there are too many response headers
/// * if the server sent a status code 101 Switching Protocols
/// * if multiple `Content-Length` headers are present
/// * if the value of the `Content-Length` header is not a nonnegative integer
/// * if the value of the `Content-Length` header is too large to represent in a `u64`
/// * if the `Content-Length` and `Transfer-Encoding` headers are both present
/// * if the `Content-Length` header is present in a 204 No Content response
/// * if multiple `Transfer-Encoding` headers are present
/// * if the `Transfer-Encoding` header indicates an encoding other than chunked
/// * if the `Transfer-Encoding` header is present in a 204 No Content response
pub fn receive<R: BufRead + ?Sized>(socket: &mut R, head: bool) -> Result<ResponseHead> {
	receive_limited(socket, head, MAX_HEAD_LENGTH)
}

/// Receives an HTTP status line and response headers, accepting at most `limit` bytes of them.
fn receive_limited<R: BufRead + ?Sized>(
	socket: &mut R,
	head: bool,
	limit: usize,
) -> Result<ResponseHead> {
	let mut buffer = Vec::new();
	loop {
		// Copy bytes until the buffer ends with two consecutive [CR]LFs, consuming only the head so
		// that the body stays in the socket.
		buffer.clear();
		loop {
			let bytes = socket.fill_buf()?;
			if bytes.is_empty() {
				return Err(ErrorKind::UnexpectedEof.into());
			}
			let old_len = buffer.len();
			let bytes_to_copy = std::cmp::min(limit - old_len, bytes.len());
			buffer.extend_from_slice(&bytes[..bytes_to_copy]);
			if let Some(n) = headers_length(&buffer) {
				socket.consume(n - old_len);
				buffer.truncate(n);
				break;
			}
			socket.consume(bytes_to_copy);
			if buffer.len() == limit {
				return Err(InvalidData::ResponseHeadersTooLong.into());
			}
		}

		let status_code = parse_status_code(&buffer)?;
		if status_code == 101 {
			// The server sent Switching Protocols, which we do not support.
			return Err(InvalidData::SwitchingProtocols.into());
		}
		if (100..=199).contains(&status_code) {
			tracing::trace!(status_code, "skipping informational response");
			continue;
		}
		break;
	}

	// Parse the headers.
	let mut header_array = [httparse::EMPTY_HEADER; MAX_HEADERS];
	let mut resp = httparse::Response::new(&mut header_array);
	match resp
		.parse(&buffer)
		.map_err(<InvalidData as From<httparse::Error>>::from)?
	{
		httparse::Status::Complete(n) if n == buffer.len() => (),
		// httparse disagrees about where the head ends, which means the newlines are malformed.
		_ => return Err(InvalidData::from(httparse::Error::NewLine).into()),
	}
	let version = match resp.version {
		Some(0) => Version::HTTP_10,
		_ => Version::HTTP_11,
	};
	let status = resp
		.code
		.and_then(|code| StatusCode::from_u16(code).ok())
		.ok_or(InvalidData::ParseHeaders(httparse::Error::Status))?;
	let reason = resp.reason.unwrap_or_default().to_owned();
	let headers = to_header_map(resp.headers)?;

	let content_length = get_content_length(&headers)?;
	let chunked = is_chunked(&headers)?;

	// A server MUST NOT send a Content-Length header field in any message that contains a
	// Transfer-Encoding header field.
	if content_length.is_some() && chunked {
		return Err(InvalidData::ContentLengthAndTransferEncoding.into());
	}

	// A server MUST NOT send a Content-Length header field in any response with a status code
	// of 1xx (Informational) or 204 (No Content).
	if status == StatusCode::NO_CONTENT {
		if chunked {
			return Err(InvalidData::TransferEncodingWithNoContent.into());
		}
		if content_length.is_some() {
			return Err(InvalidData::ContentLengthWithNoContent.into());
		}
	}

	// Follow the rules to determine response body length. CONNECT is not supported, and both
	// Transfer-Encoding other than chunked and Transfer-Encoding with Content-Length are rejected
	// above.
	let framing = if head || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
	{
		Framing::Length(0)
	} else if chunked {
		Framing::Chunked
	} else if let Some(n) = content_length {
		Framing::Length(n)
	} else {
		Framing::UntilClose
	};
	tracing::debug!(%status, ?version, ?framing, "received response head");

	Ok(ResponseHead {
		version,
		status,
		reason,
		headers,
		framing,
	})
}

/// Converts parsed headers into a [`HeaderMap`], keeping repeated headers in order.
fn to_header_map(parsed: &[httparse::Header<'_>]) -> Result<HeaderMap> {
	let mut headers = HeaderMap::with_capacity(parsed.len());
	for header in parsed {
		let bad = || InvalidData::BadHeader(header.name.to_owned());
		let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(|_| bad())?;
		let value = HeaderValue::from_bytes(header.value).map_err(|_| bad())?;
		let _ = headers.append(name, value);
	}
	Ok(headers)
}

/// Scans the headers and decodes the `Content-Length` header, if any.
///
/// # Errors
/// This function returns an error of kind [`InvalidData`](ErrorKind::InvalidData) under the
/// following conditions:
/// * if multiple `Content-Length` headers are present
/// * if the value of the `Content-Length` header is not a nonnegative integer
/// * if the value of the `Content-Length` header is too large to represent in a `u64`
fn get_content_length(headers: &HeaderMap) -> Result<Option<u64>> {
	let mut values = headers.get_all(CONTENT_LENGTH).iter();
	let Some(value) = values.next() else {
		return Ok(None);
	};
	if values.next().is_some() {
		return Err(InvalidData::MultipleContentLengths.into());
	}
	let value = std::str::from_utf8(value.as_bytes()).map_err(BadContentLength::NotUtf8)?;
	let value = value.parse::<u64>().map_err(BadContentLength::NotU64)?;
	Ok(Some(value))
}

/// Scans the buffer and determines the length of the HTTP headers.
///
/// If all headers have been received, returns `Some(n)` where `n` is the length of the headers
/// in bytes, including the final [CR]LF[CR]LF. If not all headers have been received yet,
/// returns `None`.
fn headers_length(buffer: &[u8]) -> Option<usize> {
	let mut start_pos = 0;
	let mut iter = buffer.iter();
	// position() returns the distance from where the previous call stopped, not from the start.
	while let Some(dist) = iter.position(|&b| b == b'\n' || b == b'\r') {
		let eol_pos = start_pos + dist;
		for candidate in [&b"\r\n\r\n"[..], &b"\r\n\n"[..], &b"\n\r\n"[..], &b"\n\n"[..]] {
			if buffer[eol_pos..].starts_with(candidate) {
				return Some(eol_pos + candidate.len());
			}
		}
		start_pos = eol_pos + 1;
	}
	None
}

/// Scans the headers and determines whether the `Transfer-Encoding` header is present and
/// indicates that chunked encoding is in use for the response body.
///
/// # Errors
/// This function returns an error of kind [`InvalidData`](ErrorKind::InvalidData) under the
/// following conditions:
/// * if multiple `Transfer-Encoding` headers are present
/// * if the `Transfer-Encoding` header indicates an encoding other than chunked
fn is_chunked(headers: &HeaderMap) -> Result<bool> {
	let mut values = headers.get_all(TRANSFER_ENCODING).iter();
	let Some(value) = values.next() else {
		return Ok(false);
	};
	if values.next().is_some() {
		return Err(InvalidData::MultipleTransferEncodings.into());
	}
	if crate::util::trim_ows(value.as_bytes()).eq_ignore_ascii_case(b"chunked") {
		Ok(true)
	} else {
		Err(InvalidData::NotChunked.into())
	}
}

/// Scans the buffer and extracts the HTTP status code.
///
/// # Errors
/// This function returns an error of kind [`InvalidData`](ErrorKind::InvalidData) if the
/// response status line or headers are malformed.
fn parse_status_code(buf: &[u8]) -> Result<u16> {
	// With no room for headers httparse stops at TooManyHeaders, but only after it has filled in
	// the status code.
	let mut headers = [];
	let mut resp = httparse::Response::new(&mut headers);
	match resp.parse(buf) {
		Ok(httparse::Status::Partial) => Err(InvalidData::from(httparse::Error::NewLine).into()),
		Ok(httparse::Status::Complete(_)) | Err(httparse::Error::TooManyHeaders) => resp
			.code
			.ok_or_else(|| InvalidData::from(httparse::Error::Status).into()),
		Err(e) => Err(InvalidData::from(e).into()),
	}
}
