//! Connection reuse and keep-alive policies.

use crate::config::HttpContext;
use crate::response::{Framing, ResponseHead};
use crate::util::{has_token, list_elements, trim_ows};
use http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderName, Version};
use std::time::Duration;

/// Decides whether the connection a response arrived on may serve another request.
pub trait ConnectionReuseStrategy: Send + Sync {
	/// Returns `true` if the connection may be kept alive after `response` has been consumed.
	fn keep_alive(&self, response: &ResponseHead, context: &HttpContext) -> bool;
}

/// Decides how long a reusable connection may sit idle before it stops being valid.
pub trait ConnectionKeepAliveStrategy: Send + Sync {
	/// Returns how long the connection stays valid, or `None` if it does not expire.
	fn keep_alive_duration(&self, response: &ResponseHead, context: &HttpContext)
		-> Option<Duration>;
}

/// A strategy that never reuses connections.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoConnectionReuseStrategy;

impl ConnectionReuseStrategy for NoConnectionReuseStrategy {
	fn keep_alive(&self, _response: &ResponseHead, _context: &HttpContext) -> bool {
		false
	}
}

/// The default reuse strategy.
///
/// A connection is not reused under any of the following conditions:
/// * the request asked for `Connection: close`
/// * the response uses a transfer coding other than chunked
/// * the response may have a body, is not chunked, and lacks a single valid `Content-Length`
/// * the response `Connection` header contains `close` (which takes precedence over
///   `keep-alive`)
/// * the response is HTTP/1.0 without `Connection: keep-alive`
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultConnectionReuseStrategy;

impl DefaultConnectionReuseStrategy {
	/// Returns whether the response carries exactly one `Content-Length` header holding a
	/// non-negative integer.
	fn has_valid_content_length(response: &ResponseHead) -> bool {
		let mut values = response.headers.get_all(CONTENT_LENGTH).iter();
		match (values.next(), values.next()) {
			(Some(value), None) => value
				.to_str()
				.ok()
				.and_then(|v| v.trim().parse::<u64>().ok())
				.is_some(),
			_ => false,
		}
	}
}

impl ConnectionReuseStrategy for DefaultConnectionReuseStrategy {
	fn keep_alive(&self, response: &ResponseHead, context: &HttpContext) -> bool {
		if context.connection_close_requested() {
			return false;
		}
		if response.framing == Framing::UntilClose {
			return false;
		}
		if let Some(te) = response.headers.get(TRANSFER_ENCODING) {
			if !trim_ows(te.as_bytes()).eq_ignore_ascii_case(b"chunked") {
				return false;
			}
		} else if response.has_body() && !Self::has_valid_content_length(response) {
			return false;
		}

		// Proxy-Connection is a widespread nonstandard synonym for Connection.
		let proxy_connection = HeaderName::from_static("proxy-connection");
		let connection_header = if response.headers.contains_key(CONNECTION) {
			CONNECTION
		} else {
			proxy_connection
		};
		if has_token(&response.headers, &connection_header, "close") {
			return false;
		}
		if has_token(&response.headers, &connection_header, "keep-alive") {
			return true;
		}
		response.version >= Version::HTTP_11
	}
}

/// The default keep-alive strategy.
///
/// A `Keep-Alive: timeout=<seconds>` response header gives the validity period; without one, the
/// connection does not expire.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultConnectionKeepAliveStrategy;

impl ConnectionKeepAliveStrategy for DefaultConnectionKeepAliveStrategy {
	fn keep_alive_duration(
		&self,
		response: &ResponseHead,
		_context: &HttpContext,
	) -> Option<Duration> {
		let keep_alive = HeaderName::from_static("keep-alive");
		response
			.headers
			.get_all(keep_alive)
			.iter()
			.flat_map(|value| list_elements(value.as_bytes()))
			.find_map(|element| {
				let (name, value) = split_param(element)?;
				if !name.eq_ignore_ascii_case(b"timeout") {
					return None;
				}
				std::str::from_utf8(value).ok()?.parse::<u64>().ok()
			})
			.map(Duration::from_secs)
	}
}

/// Splits a `name=value` parameter, removing whitespace and quotes around the value.
fn split_param(element: &[u8]) -> Option<(&[u8], &[u8])> {
	let eq = element.iter().position(|&b| b == b'=')?;
	let name = trim_ows(&element[..eq]);
	let mut value = trim_ows(&element[eq + 1..]);
	if value.len() >= 2 && value.first() == Some(&b'"') && value.last() == Some(&b'"') {
		value = &value[1..value.len() - 1];
	}
	Some((name, value))
}

impl<F> ConnectionReuseStrategy for F
where
	F: Fn(&ResponseHead, &HttpContext) -> bool + Send + Sync,
{
	fn keep_alive(&self, response: &ResponseHead, context: &HttpContext) -> bool {
		self(response, context)
	}
}

impl<F> ConnectionKeepAliveStrategy for F
where
	F: Fn(&ResponseHead, &HttpContext) -> Option<Duration> + Send + Sync,
{
	fn keep_alive_duration(
		&self,
		response: &ResponseHead,
		context: &HttpContext,
	) -> Option<Duration> {
		self(response, context)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use http::{HeaderMap, HeaderValue, StatusCode};

	fn head(
		version: Version,
		pairs: &[(&'static str, &'static str)],
		framing: Framing,
	) -> ResponseHead {
		let mut headers = HeaderMap::new();
		for (name, value) in pairs {
			let _ = headers.append(*name, HeaderValue::from_static(value));
		}
		ResponseHead {
			version,
			status: StatusCode::OK,
			reason: "OK".to_owned(),
			headers,
			framing,
		}
	}

	/// Tests the persistence rules of the default reuse strategy.
	#[test]
	fn test_default_reuse() {
		let s = DefaultConnectionReuseStrategy;
		let ctx = HttpContext::new();
		let len = Framing::Length(3);
		assert!(s.keep_alive(&head(Version::HTTP_11, &[("content-length", "3")], len), &ctx));
		assert!(!s.keep_alive(&head(Version::HTTP_10, &[("content-length", "3")], len), &ctx));
		assert!(s.keep_alive(
			&head(
				Version::HTTP_10,
				&[("content-length", "3"), ("connection", "Keep-Alive")],
				len
			),
			&ctx
		));
		assert!(!s.keep_alive(
			&head(
				Version::HTTP_11,
				&[("content-length", "3"), ("connection", "keep-alive, close")],
				len
			),
			&ctx
		));
		assert!(!s.keep_alive(
			&head(
				Version::HTTP_11,
				&[("content-length", "3"), ("content-length", "3")],
				len
			),
			&ctx
		));
		assert!(s.keep_alive(
			&head(Version::HTTP_11, &[("transfer-encoding", "chunked")], Framing::Chunked),
			&ctx
		));
		assert!(!s.keep_alive(&head(Version::HTTP_11, &[], Framing::UntilClose), &ctx));
		assert!(s.keep_alive(&head(Version::HTTP_11, &[], Framing::Length(0)), &ctx));
		assert!(!s.keep_alive(
			&head(
				Version::HTTP_11,
				&[("content-length", "3"), ("proxy-connection", "close")],
				len
			),
			&ctx
		));
	}

	/// Tests that a request asking for `Connection: close` prevents reuse.
	#[test]
	fn test_request_close() {
		let mut ctx = HttpContext::new();
		ctx.set_request(http::Method::GET, true);
		assert!(!DefaultConnectionReuseStrategy.keep_alive(
			&head(Version::HTTP_11, &[("content-length", "0")], Framing::Length(0)),
			&ctx
		));
	}

	/// Tests reading the keep-alive timeout.
	#[test]
	fn test_default_keep_alive() {
		let s = DefaultConnectionKeepAliveStrategy;
		let ctx = HttpContext::new();
		let len = Framing::Length(0);
		assert_eq!(
			s.keep_alive_duration(
				&head(Version::HTTP_11, &[("keep-alive", "timeout=5, max=100")], len),
				&ctx
			),
			Some(Duration::from_secs(5))
		);
		assert_eq!(
			s.keep_alive_duration(
				&head(Version::HTTP_11, &[("keep-alive", "max=1, timeout = \"7\"")], len),
				&ctx
			),
			Some(Duration::from_secs(7))
		);
		assert_eq!(
			s.keep_alive_duration(
				&head(Version::HTTP_11, &[("keep-alive", "timeout=soon")], len),
				&ctx
			),
			None
		);
		assert_eq!(s.keep_alive_duration(&head(Version::HTTP_11, &[], len), &ctx), None);
	}

	/// Tests using closures as strategies.
	#[test]
	fn test_closures() {
		let reuse = |_: &ResponseHead, _: &HttpContext| true;
		let keep_alive = |_: &ResponseHead, _: &HttpContext| Some(Duration::from_secs(1));
		let response = head(Version::HTTP_10, &[], Framing::UntilClose);
		let ctx = HttpContext::new();
		assert!(reuse.keep_alive(&response, &ctx));
		assert_eq!(
			keep_alive.keep_alive_duration(&response, &ctx),
			Some(Duration::from_secs(1))
		);
		assert!(!NoConnectionReuseStrategy.keep_alive(&response, &ctx));
	}
}
