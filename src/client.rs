//! The client facade.

use crate::config::HttpContext;
use crate::conn::{ConnectionManager, ManagedConnection};
use crate::error::{ConnectError, Error};
use crate::exec::MinimalClientExec;
use crate::request::{Request, RequestWrapper};
use crate::response::Response;
use crate::route::{HttpHost, Route, Scheme};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A minimal HTTP client.
///
/// The client resolves the route for each request, installs any per-request configuration into
/// the execution context, and hands the request to a [`MinimalClientExec`]. It performs no
/// redirect handling, authentication, cookie management or retries.
///
/// The client may be shared between threads; each call to `execute` leases its own connection.
/// Once [`close`](Self::close) has been called, every further execution fails.
#[derive(Debug)]
pub struct MinimalHttpClient {
	/// The connection manager, shared with the pipeline.
	manager: Arc<dyn ConnectionManager>,

	/// The execution pipeline.
	exec: MinimalClientExec,

	/// Whether the client has been closed.
	closed: AtomicBool,
}

impl MinimalHttpClient {
	/// Constructs a client over a connection manager, using the default strategies.
	#[must_use]
	pub fn new(manager: Arc<dyn ConnectionManager>) -> Self {
		Self::with_exec(MinimalClientExec::with_defaults(manager))
	}

	/// Constructs a client around an execution pipeline.
	#[must_use]
	pub fn with_exec(exec: MinimalClientExec) -> Self {
		Self {
			manager: Arc::clone(exec.connection_manager()),
			exec,
			closed: AtomicBool::new(false),
		}
	}

	/// Executes a request, sending it to the host named by its URI.
	///
	/// # Errors
	/// This function returns [`Error::InvalidArgument`] if the request URI is not absolute or does
	/// not name an `http` or `https` host. Otherwise it fails as [`execute_on`](Self::execute_on)
	/// does.
	pub fn execute(&self, request: Request) -> Result<Response, Error> {
		let target = HttpHost::from_uri(request.uri());
		self.execute_on(target.as_ref(), request, None)
	}

	/// Executes a request against an explicit target.
	///
	/// If `context` is `None`, a fresh context is used for this execution only. If the request
	/// carries its own [`RequestConfig`](crate::RequestConfig), it replaces any configuration
	/// already in the context.
	///
	/// # Errors
	/// * [`Error::InvalidArgument`] if `target` is `None`; nothing is leased
	/// * [`Error::Connectivity`] if the client has been closed or no connection could be leased
	/// * [`Error::ClientProtocol`] if the exchange failed
	/// * [`Error::Cancelled`] if the request was aborted through its
	///   [`AbortHandle`](crate::AbortHandle)
	pub fn execute_on(
		&self,
		target: Option<&HttpHost>,
		request: Request,
		context: Option<&mut HttpContext>,
	) -> Result<Response, Error> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(ConnectError::Shutdown.into());
		}
		let Some(target) = target else {
			return Err(Error::InvalidArgument("Target host"));
		};

		let mut local_context = HttpContext::new();
		let context = context.unwrap_or(&mut local_context);
		context.set_target(target.clone());
		let route = Route::new(target);
		tracing::debug!(%target, %route, "route resolved");
		if let Some(config) = request.config() {
			context.set_request_config(config.clone());
		}

		self.exec
			.execute(&route, RequestWrapper::wrap(request), context)
			.map_err(|e| match e {
				Error::Protocol(e) => Error::ClientProtocol(e),
				e => e,
			})
	}

	/// Closes the client and shuts down its connection manager.
	///
	/// Responses already returned remain readable only as far as the manager allows.
	pub fn close(&self) {
		if !self.closed.swap(true, Ordering::SeqCst) {
			tracing::debug!("closing client");
		}
		self.manager.shutdown();
	}

	/// Returns whether [`close`](Self::close) has been called.
	#[must_use]
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Returns a connection manager view for callers written against the older manager interface.
	#[must_use]
	pub fn connection_manager(&self) -> LegacyConnectionManager {
		LegacyConnectionManager {
			manager: Arc::clone(&self.manager),
		}
	}
}

/// The older connection manager interface, in which callers lease and release connections
/// themselves.
pub trait ClientConnectionManager: Send + Sync + Debug {
	/// Leases a connection for a route.
	///
	/// # Errors
	/// This function returns an error if no connection can be leased.
	fn request_connection(&self, route: &Route) -> Result<Box<dyn ManagedConnection>, Error>;

	/// Returns a connection leased through [`request_connection`](Self::request_connection).
	///
	/// # Errors
	/// This function returns an error if the connection cannot be taken back.
	fn release_connection(
		&self,
		connection: Box<dyn ManagedConnection>,
		valid_for: Option<Duration>,
	) -> Result<(), Error>;

	/// Returns the schemes that connections can be opened for.
	///
	/// # Errors
	/// This function returns an error if the registry is not available.
	fn scheme_registry(&self) -> Result<&[Scheme], Error>;

	/// Closes connections that have been idle for at least `max_idle`.
	fn close_idle_connections(&self, max_idle: Duration);

	/// Closes connections whose validity period has elapsed.
	fn close_expired_connections(&self);

	/// Closes all connections and refuses further leases.
	fn shutdown(&self);
}

/// The [`ClientConnectionManager`] view of a [`MinimalHttpClient`].
///
/// Cleanup operations pass through to the client’s connection manager. The client keeps no record
/// of connections leased outside its own executions, so leasing, releasing and the scheme registry
/// are refused with [`Error::UnsupportedOperation`].
#[derive(Clone, Debug)]
pub struct LegacyConnectionManager {
	manager: Arc<dyn ConnectionManager>,
}

impl ClientConnectionManager for LegacyConnectionManager {
	fn request_connection(&self, _route: &Route) -> Result<Box<dyn ManagedConnection>, Error> {
		Err(Error::UnsupportedOperation("Connection leasing"))
	}

	fn release_connection(
		&self,
		_connection: Box<dyn ManagedConnection>,
		_valid_for: Option<Duration>,
	) -> Result<(), Error> {
		Err(Error::UnsupportedOperation("Connection release"))
	}

	fn scheme_registry(&self) -> Result<&[Scheme], Error> {
		Err(Error::UnsupportedOperation("Scheme registry"))
	}

	fn close_idle_connections(&self, max_idle: Duration) {
		self.manager.close_idle_connections(max_idle);
	}

	fn close_expired_connections(&self) {
		self.manager.close_expired_connections();
	}

	fn shutdown(&self) {
		self.manager.shutdown();
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::config::RequestConfig;
	use crate::conn::{BasicConnectionManager, Disposition};
	use crate::error::ProtocolError;
	use crate::producer::ZeroCopyPut;
	use crate::util::mock::{MockConnection, RecordingManager};
	use http::{Method, StatusCode, Uri};
	use std::io::{BufRead, BufReader, Read, Write};
	use std::net::TcpListener;

	fn recording(scripts: &[&[u8]]) -> (Arc<RecordingManager>, MinimalHttpClient) {
		let manager = Arc::new(RecordingManager::with_scripts(scripts));
		let client = MinimalHttpClient::new(manager.clone());
		(manager, client)
	}

	/// Tests that a request without a determinable target fails before anything is leased.
	#[test]
	fn test_missing_target() {
		let (manager, client) = recording(&[]);
		assert!(matches!(
			client.execute(Request::get(Uri::from_static("/relative"))),
			Err(Error::InvalidArgument("Target host"))
		));
		assert!(matches!(
			client.execute_on(None, Request::get(Uri::from_static("http://a/")), None),
			Err(Error::InvalidArgument(_))
		));
		assert!(manager.leases().is_empty());
	}

	/// Tests that executing after close fails without touching the manager.
	#[test]
	fn test_closed() {
		let (manager, client) = recording(&[b"HTTP/1.1 204 No Content\r\n\r\n"]);
		client.close();
		client.close();
		assert!(client.is_closed());
		assert!(matches!(
			client.execute(Request::get(Uri::from_static("http://a/"))),
			Err(Error::Connectivity(ConnectError::Shutdown))
		));
		assert!(manager.leases().is_empty());
		assert_eq!(manager.shutdowns(), 2);
	}

	/// Tests that exchange failures reach the caller as client protocol failures.
	#[test]
	fn test_protocol_failure() {
		let (manager, client) = recording(&[b"HTTP/1.1 abc\r\n\r\n"]);
		match client.execute(Request::get(Uri::from_static("http://a/"))) {
			Err(Error::ClientProtocol(ProtocolError::Io(e))) => {
				assert_eq!(e.kind(), std::io::ErrorKind::InvalidData);
			}
			other => panic!("Expected ClientProtocol, got {:?}", other),
		}
		assert_eq!(manager.releases(), vec![Disposition::Discard]);
	}

	/// Tests that per-request configuration reaches the exchange and the caller’s context.
	#[test]
	fn test_request_config() {
		let (manager, client) = recording(&[b"HTTP/1.1 204 No Content\r\n\r\n"]);
		let request = Request::builder(Method::GET, Uri::from_static("http://Example.com/x"))
			.config(RequestConfig::default().with_user_agent("agent/1"))
			.build();
		let mut context = HttpContext::new();
		let response = client.execute_on(
			Some(&HttpHost::new(Scheme::Http, "example.com", None)),
			request,
			Some(&mut context),
		);
		assert_eq!(response.unwrap().status(), StatusCode::NO_CONTENT);
		assert_eq!(
			context.request_config().and_then(|c| c.user_agent.as_deref()),
			Some("agent/1")
		);
		assert_eq!(context.route().map(Route::port), Some(80));
		assert!(context.is_request_sent());
		assert_eq!(
			String::from_utf8(manager.written()).unwrap(),
			"GET /x HTTP/1.1\r\nhost: example.com\r\nuser-agent: agent/1\r\n\r\n"
		);
	}

	/// Tests that the client can be shared between threads.
	#[test]
	fn test_send_sync() {
		fn assert_send_sync<T: Send + Sync>() {}
		assert_send_sync::<MinimalHttpClient>();
		assert_send_sync::<MinimalClientExec>();
	}

	/// Tests that concurrent executions on one client each release their own connection once.
	#[test]
	fn test_concurrent_execute() {
		const THREADS: usize = 16;
		let scripts = vec![&b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok"[..]; THREADS];
		let (manager, client) = recording(&scripts);
		let client = Arc::new(client);
		let threads: Vec<_> = (0..THREADS)
			.map(|_| {
				let client = Arc::clone(&client);
				std::thread::spawn(move || {
					let mut response = client
						.execute(Request::get(Uri::from_static("http://a/")))
						.unwrap();
					let mut body = String::new();
					let _ = response.read_to_string(&mut body).unwrap();
					body
				})
			})
			.collect();
		for thread in threads {
			assert_eq!(thread.join().unwrap(), "ok");
		}
		assert_eq!(manager.leases().len(), THREADS);
		assert_eq!(
			manager.releases(),
			vec![Disposition::Reusable { valid_for: None }; THREADS]
		);
	}

	/// Tests the legacy connection manager view.
	#[test]
	fn test_legacy_manager() {
		let (manager, client) = recording(&[]);
		let legacy = client.connection_manager();
		legacy.close_idle_connections(Duration::from_secs(9));
		legacy.close_expired_connections();
		legacy.shutdown();
		assert_eq!(manager.idle_closes(), vec![Duration::from_secs(9)]);
		assert_eq!(manager.expired_closes(), 1);
		assert_eq!(manager.shutdowns(), 1);

		let route = Route::new(&HttpHost::new(Scheme::Http, "a", None));
		assert!(matches!(
			legacy.request_connection(&route),
			Err(Error::UnsupportedOperation(_))
		));
		assert!(matches!(
			legacy.release_connection(Box::new(MockConnection::new(Vec::new())), None),
			Err(Error::UnsupportedOperation(_))
		));
		assert!(matches!(
			legacy.scheme_registry(),
			Err(Error::UnsupportedOperation(_))
		));
		assert!(manager.leases().is_empty());
	}

	/// Reads one request from `reader`, returning its request line and body.
	fn read_request(reader: &mut BufReader<std::net::TcpStream>) -> (String, Vec<u8>) {
		let mut request_line = String::new();
		let _ = reader.read_line(&mut request_line).unwrap();
		let mut length = 0_usize;
		loop {
			let mut line = String::new();
			let _ = reader.read_line(&mut line).unwrap();
			if line == "\r\n" {
				break;
			}
			if let Some(value) = line.strip_prefix("content-length:") {
				length = value.trim().parse().unwrap();
			}
		}
		let mut body = vec![0_u8; length];
		reader.read_exact(&mut body).unwrap();
		(request_line.trim_end().to_owned(), body)
	}

	/// Tests uploading a file and then fetching over the same TCP connection.
	#[test]
	fn test_loopback() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		let server = std::thread::spawn(move || {
			let (stream, _) = listener.accept().unwrap();
			let mut writer = stream.try_clone().unwrap();
			let mut reader = BufReader::new(stream);
			let (put_line, put_body) = read_request(&mut reader);
			writer
				.write_all(b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n")
				.unwrap();
			let (get_line, _) = read_request(&mut reader);
			writer
				.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")
				.unwrap();
			(put_line, put_body, get_line)
		});

		let content: Vec<u8> = (0..20000_u32).map(|i| (i % 253) as u8).collect();
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(&content).unwrap();
		file.flush().unwrap();

		let config = RequestConfig::default().with_socket_timeout(Duration::from_secs(10));
		let client = MinimalHttpClient::new(Arc::new(BasicConnectionManager::new()));
		let uri: Uri = format!("http://127.0.0.1:{}/upload", port).parse().unwrap();
		let producer = ZeroCopyPut::new(uri, file.path(), None).unwrap();
		let response = client.execute(producer.generate_request()).unwrap();
		assert_eq!(response.status(), StatusCode::CREATED);
		drop(response);

		let uri: Uri = format!("http://127.0.0.1:{}/data", port).parse().unwrap();
		let request = Request::builder(Method::GET, uri).config(config).build();
		let mut response = client.execute(request).unwrap();
		let mut body = String::new();
		let _ = response.read_to_string(&mut body).unwrap();
		assert_eq!(body, "hello");
		drop(response);
		client.close();

		let (put_line, put_body, get_line) = server.join().unwrap();
		assert_eq!(put_line, "PUT /upload HTTP/1.1");
		assert_eq!(put_body, content);
		assert_eq!(get_line, "GET /data HTTP/1.1");
	}
}
