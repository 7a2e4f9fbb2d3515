#[cfg(test)]
pub mod mock;

use http::header::HeaderName;
use http::HeaderMap;

/// Checks whether a byte is a valid character to appear in a `request-target`.
///
/// This check is relaxed and does not check the full requirements for path validity.
pub fn is_request_target_char(b: u8) -> bool {
	(0x21_u8..=0x7E_u8).contains(&b)
}

/// Checks whether a string is a `request-target`.
///
/// This check is relaxed and does not check the full requirements for path validity.
pub fn is_request_target(req: &str) -> bool {
	!req.is_empty() && req.bytes().all(is_request_target_char)
}

/// Iterates over the comma-separated elements of a header value, with surrounding spaces and tabs
/// removed and empty elements skipped.
pub fn list_elements(value: &[u8]) -> impl Iterator<Item = &[u8]> {
	value
		.split(|b| *b == b',')
		.map(trim_ows)
		.filter(|element| !element.is_empty())
}

/// Removes leading and trailing spaces and tabs.
pub fn trim_ows(mut value: &[u8]) -> &[u8] {
	while value.first() == Some(&b' ') || value.first() == Some(&b'\t') {
		value = &value[1..];
	}
	while value.last() == Some(&b' ') || value.last() == Some(&b'\t') {
		value = &value[..value.len() - 1];
	}
	value
}

/// Scans every instance of a list-valued header and determines whether any of them contains
/// `token`, compared case-insensitively.
pub fn has_token(headers: &HeaderMap, name: &HeaderName, token: &str) -> bool {
	headers.get_all(name).iter().any(|value| {
		list_elements(value.as_bytes()).any(|element| element.eq_ignore_ascii_case(token.as_bytes()))
	})
}

/// Scans the headers and determines whether the `connection` header is present and contains the
/// `close` option.
pub fn is_connection_close(headers: &HeaderMap) -> bool {
	has_token(headers, &http::header::CONNECTION, "close")
}

#[cfg(test)]
mod test {
	use super::*;
	use http::HeaderValue;

	/// Tests scanning `Connection` headers.
	#[test]
	fn test_is_connection_close() {
		let mut headers = HeaderMap::new();
		assert!(!is_connection_close(&headers));
		let _ = headers.append("connection", HeaderValue::from_static("keep-alive"));
		assert!(!is_connection_close(&headers));
		let _ = headers.append("connection", HeaderValue::from_static("upgrade ,\tClose "));
		assert!(is_connection_close(&headers));
	}

	/// Tests splitting list-valued headers.
	#[test]
	fn test_list_elements() {
		let elements: Vec<&[u8]> = list_elements(b" a, ,b\t,c ").collect();
		assert_eq!(elements, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
	}

	/// Tests request target validation.
	#[test]
	fn test_is_request_target() {
		assert!(is_request_target("/a/b?c=d"));
		assert!(!is_request_target(""));
		assert!(!is_request_target("/a b"));
	}
}
