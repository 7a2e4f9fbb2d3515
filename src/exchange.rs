//! The wire exchange: sending a request over a leased connection and receiving the response head.

use crate::config::HttpContext;
use crate::conn::ManagedConnection;
use crate::error::ProtocolError;
use crate::request::{send_head, RequestWrapper};
use crate::response::{receive_head, ResponseHead};
use http::header::{
	HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING, USER_AGENT,
};
use http::Method;

/// Runs one request/response exchange over a connection.
pub trait ProtocolExchange: Send + Sync {
	/// Sends `request` over `connection` and receives the final response head.
	///
	/// On success the connection is positioned at the start of the response body.
	///
	/// # Errors
	/// This function returns an error if the request cannot be sent, or if the response cannot be
	/// received or is invalid. The connection is then in an unknown state and must be discarded.
	fn execute(
		&self,
		request: &mut RequestWrapper,
		connection: &mut dyn ManagedConnection,
		context: &mut HttpContext,
	) -> Result<ResponseHead, ProtocolError>;
}

/// The HTTP/1.1 exchange.
///
/// Before sending, the headers the request is missing are derived:
/// * `Host` from the target
/// * `Content-Length`, or `Transfer-Encoding: chunked` when the length is unknown, from the entity,
///   replacing any supplied by the caller
/// * `Content-Length: 0` for `POST`, `PUT` and `PATCH` requests with no entity
/// * `Content-Type` from the entity
/// * `User-Agent` from the request configuration
#[derive(Clone, Copy, Debug, Default)]
pub struct Http1Exchange;

impl Http1Exchange {
	/// Adds the headers derived from the target, entity and configuration.
	fn add_request_headers(
		request: &mut RequestWrapper,
		context: &HttpContext,
	) -> Result<(), ProtocolError> {
		let method = request.method().clone();
		let (length, content_type) = match request.entity_mut() {
			Some(entity) => (Some(entity.content_length()), entity.content_type().cloned()),
			None => (None, None),
		};
		let user_agent = context
			.request_config()
			.and_then(|config| config.user_agent.as_deref())
			.map(HeaderValue::from_str)
			.transpose()
			.map_err(invalid_input)?;
		let host = context
			.target()
			.map(|target| HeaderValue::from_str(&target.to_host_string()))
			.transpose()
			.map_err(invalid_input)?;

		let headers = request.headers_mut();
		if !headers.contains_key(HOST) {
			if let Some(host) = host {
				let _ = headers.insert(HOST, host);
			}
		}
		let _ = headers.remove(CONTENT_LENGTH);
		let _ = headers.remove(TRANSFER_ENCODING);
		match length {
			Some(Some(n)) => {
				let _ = headers.insert(CONTENT_LENGTH, HeaderValue::from(n));
			}
			Some(None) => {
				let _ = headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
			}
			None if method == Method::POST || method == Method::PUT || method == Method::PATCH => {
				let _ = headers.insert(CONTENT_LENGTH, HeaderValue::from(0_u64));
			}
			None => (),
		}
		if !headers.contains_key(CONTENT_TYPE) {
			if let Some(content_type) = content_type {
				let _ = headers.insert(CONTENT_TYPE, content_type);
			}
		}
		if !headers.contains_key(USER_AGENT) {
			if let Some(user_agent) = user_agent {
				let _ = headers.insert(USER_AGENT, user_agent);
			}
		}
		Ok(())
	}
}

/// Converts an invalid header value into a protocol error.
fn invalid_input(e: http::header::InvalidHeaderValue) -> ProtocolError {
	std::io::Error::new(std::io::ErrorKind::InvalidInput, e).into()
}

impl ProtocolExchange for Http1Exchange {
	fn execute(
		&self,
		request: &mut RequestWrapper,
		connection: &mut dyn ManagedConnection,
		context: &mut HttpContext,
	) -> Result<ResponseHead, ProtocolError> {
		let method = request.method().clone();
		if method == Method::CONNECT {
			return Err(ProtocolError::UnsupportedMethod(method));
		}
		Self::add_request_headers(request, context)?;
		context.set_request(
			method.clone(),
			crate::util::is_connection_close(request.headers()),
		);
		context.set_request_sent(false);

		tracing::debug!(%method, target = request.request_target(), "sending request");
		{
			let mut socket: &mut dyn ManagedConnection = &mut *connection;
			let mut body = send_head(
				&method,
				request.request_target(),
				request.headers(),
				&mut socket,
			)?;
			if let Some(entity) = request.entity_mut() {
				if let Some(length) = entity.content_length() {
					body.hint_length(length);
				}
				entity.write_to(&mut body)?;
			}
			body.finish()?;
		}
		connection.flush()?;
		context.set_request_sent(true);

		Ok(receive_head(connection, method == Method::HEAD)?)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::request::{Entity, Request};
	use crate::response::Framing;
	use crate::route::{HttpHost, Scheme};
	use crate::util::mock::MockConnection;
	use crate::RequestConfig;
	use http::{StatusCode, Uri};
	use parking_lot::Mutex;
	use std::sync::Arc;

	fn context() -> HttpContext {
		let mut context = HttpContext::new();
		context.set_target(HttpHost::new(Scheme::Http, "example.com", Some(8080)));
		context
	}

	/// Tests a `GET` exchange, including the derived headers.
	#[test]
	fn test_get() {
		let output = Arc::new(Mutex::new(Vec::new()));
		let mut connection =
			MockConnection::new(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi".to_vec())
				.with_output(output.clone());
		let mut request = RequestWrapper::wrap(Request::get(Uri::from_static(
			"http://example.com:8080/x?y=z",
		)));
		let mut context = context();
		context.set_request_config(RequestConfig::default().with_user_agent("sahc-test"));
		let head = Http1Exchange
			.execute(&mut request, &mut connection, &mut context)
			.unwrap();
		assert_eq!(head.status, StatusCode::OK);
		assert_eq!(head.framing, Framing::Length(2));
		assert!(context.is_request_sent());
		assert_eq!(context.method(), Some(&Method::GET));
		assert_eq!(
			*output.lock(),
			b"GET /x?y=z HTTP/1.1\r\nhost: example.com:8080\r\nuser-agent: sahc-test\r\n\r\n"
		);
	}

	/// Tests sending an in-memory entity with a known length.
	#[test]
	fn test_post_entity() {
		let output = Arc::new(Mutex::new(Vec::new()));
		let mut connection = MockConnection::new(b"HTTP/1.1 204 No Content\r\n\r\n".to_vec())
			.with_output(output.clone());
		let request = Request::builder(Method::POST, Uri::from_static("/submit"))
			.header(http::header::CONNECTION, HeaderValue::from_static("close"))
			.entity(Entity::bytes(
				&b"abc"[..],
				Some(HeaderValue::from_static("text/plain")),
			))
			.build();
		let mut request = RequestWrapper::wrap(request);
		let mut context = context();
		let head = Http1Exchange
			.execute(&mut request, &mut connection, &mut context)
			.unwrap();
		assert_eq!(head.framing, Framing::Length(0));
		assert!(context.connection_close_requested());
		assert_eq!(
			*output.lock(),
			b"POST /submit HTTP/1.1\r\nconnection: close\r\nhost: example.com:8080\r\ncontent-length: 3\r\ncontent-type: text/plain\r\n\r\nabc"
		);
	}

	/// Tests that framing headers supplied by the caller are replaced by those of the entity.
	#[test]
	fn test_framing_replaced() {
		let output = Arc::new(Mutex::new(Vec::new()));
		let mut connection = MockConnection::new(b"HTTP/1.1 204 No Content\r\n\r\n".to_vec())
			.with_output(output.clone());
		let request = Request::builder(Method::POST, Uri::from_static("/submit"))
			.header(CONTENT_LENGTH, HeaderValue::from_static("999"))
			.header(TRANSFER_ENCODING, HeaderValue::from_static("gzip"))
			.entity(Entity::bytes(&b"abc"[..], None))
			.build();
		let mut request = RequestWrapper::wrap(request);
		let _ = Http1Exchange
			.execute(&mut request, &mut connection, &mut HttpContext::new())
			.unwrap();
		let output = String::from_utf8(output.lock().clone()).unwrap();
		assert!(output.contains("\r\ncontent-length: 3\r\n"));
		assert!(!output.contains("999"));
		assert!(!output.contains("transfer-encoding"));
		assert!(output.ends_with("\r\n\r\nabc"));
	}

	/// Tests that an empty `PUT` gets a zero `Content-Length`.
	#[test]
	fn test_empty_put() {
		let output = Arc::new(Mutex::new(Vec::new()));
		let mut connection =
			MockConnection::new(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec())
				.with_output(output.clone());
		let mut request = RequestWrapper::wrap(
			Request::builder(Method::PUT, Uri::from_static("/f")).build(),
		);
		let _ = Http1Exchange
			.execute(&mut request, &mut connection, &mut HttpContext::new())
			.unwrap();
		assert_eq!(*output.lock(), b"PUT /f HTTP/1.1\r\ncontent-length: 0\r\n\r\n");
	}

	/// Tests that `CONNECT` is refused before anything is written.
	#[test]
	fn test_connect_refused() {
		let output = Arc::new(Mutex::new(Vec::new()));
		let mut connection = MockConnection::new(Vec::new()).with_output(output.clone());
		let mut request = RequestWrapper::wrap(
			Request::builder(Method::CONNECT, Uri::from_static("example.com:443")).build(),
		);
		let mut context = HttpContext::new();
		match Http1Exchange.execute(&mut request, &mut connection, &mut context) {
			Err(ProtocolError::UnsupportedMethod(m)) => assert_eq!(m, Method::CONNECT),
			other => panic!("Expected UnsupportedMethod, got {:?}", other),
		}
		assert!(output.lock().is_empty());
		assert!(!context.is_request_sent());
	}

	/// Tests that a malformed response is reported as a protocol error after the request was sent.
	#[test]
	fn test_bad_response() {
		let mut connection = MockConnection::new(b"SMTP ready\r\n\r\n".to_vec());
		let mut request = RequestWrapper::wrap(Request::get(Uri::from_static("/")));
		let mut context = HttpContext::new();
		match Http1Exchange.execute(&mut request, &mut connection, &mut context) {
			Err(ProtocolError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
			other => panic!("Expected Io, got {:?}", other),
		}
		assert!(context.is_request_sent());
	}
}
