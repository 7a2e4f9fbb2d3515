//! In-memory connections and managers for tests.

use crate::config::RequestConfig;
use crate::conn::{ConnectionManager, Connector, Disposition, ManagedConnection};
use crate::error::ConnectError;
use crate::route::Route;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, Cursor, Read, Result, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A connection that replays a fixed server byte stream and records what the client writes.
#[derive(Debug)]
pub struct MockConnection {
	/// The bytes the server “sends”.
	input: Cursor<Vec<u8>>,

	/// The bytes the client wrote, shared so tests can inspect them after the connection is gone.
	output: Arc<Mutex<Vec<u8>>>,

	/// Counts calls to `close` that actually closed the connection.
	closed: Arc<AtomicUsize>,

	/// Whether the connection is open.
	open: bool,

	/// Every socket timeout set, in order.
	socket_timeouts: Arc<Mutex<Vec<Option<Duration>>>>,
}

impl MockConnection {
	pub fn new(input: Vec<u8>) -> Self {
		Self {
			input: Cursor::new(input),
			output: Arc::default(),
			closed: Arc::default(),
			open: true,
			socket_timeouts: Arc::default(),
		}
	}

	pub fn with_output(mut self, output: Arc<Mutex<Vec<u8>>>) -> Self {
		self.output = output;
		self
	}

	pub fn with_timeout_log(mut self, socket_timeouts: Arc<Mutex<Vec<Option<Duration>>>>) -> Self {
		self.socket_timeouts = socket_timeouts;
		self
	}

	pub fn with_close_counter(mut self, closed: Arc<AtomicUsize>) -> Self {
		self.closed = closed;
		self
	}
}

impl Read for MockConnection {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		self.input.read(buf)
	}
}

impl BufRead for MockConnection {
	fn fill_buf(&mut self) -> Result<&[u8]> {
		self.input.fill_buf()
	}

	fn consume(&mut self, amt: usize) {
		self.input.consume(amt);
	}
}

impl Write for MockConnection {
	fn write(&mut self, buf: &[u8]) -> Result<usize> {
		self.output.lock().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> Result<()> {
		Ok(())
	}
}

impl ManagedConnection for MockConnection {
	fn is_open(&self) -> bool {
		self.open
	}

	fn set_socket_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
		self.socket_timeouts.lock().push(timeout);
		Ok(())
	}

	fn close(&mut self) -> Result<()> {
		if self.open {
			self.open = false;
			let _ = self.closed.fetch_add(1, Ordering::SeqCst);
		}
		Ok(())
	}
}

/// A connector that opens [`MockConnection`]s with no server data and counts opens and closes.
#[derive(Clone, Debug, Default)]
pub struct MockConnector {
	opened: Arc<AtomicUsize>,
	closed: Arc<AtomicUsize>,
}

impl MockConnector {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn opened(&self) -> usize {
		self.opened.load(Ordering::SeqCst)
	}

	pub fn closed(&self) -> usize {
		self.closed.load(Ordering::SeqCst)
	}
}

impl Connector for MockConnector {
	fn connect(
		&self,
		_route: &Route,
		_connect_timeout: Option<Duration>,
	) -> std::result::Result<Box<dyn ManagedConnection>, ConnectError> {
		let _ = self.opened.fetch_add(1, Ordering::SeqCst);
		Ok(Box::new(
			MockConnection::new(Vec::new()).with_close_counter(self.closed.clone()),
		))
	}
}

/// A connection manager that hands out one scripted connection per lease and records every
/// release.
#[derive(Debug, Default)]
pub struct RecordingManager {
	/// The server byte streams for successive leases.
	scripts: Mutex<VecDeque<Vec<u8>>>,

	/// Whether leases fail.
	refuse: bool,

	/// The routes leased.
	leases: Mutex<Vec<Route>>,

	/// The dispositions released.
	releases: Mutex<Vec<Disposition>>,

	/// Everything written to any leased connection.
	written: Arc<Mutex<Vec<u8>>>,

	/// Every socket timeout set on any leased connection.
	socket_timeouts: Arc<Mutex<Vec<Option<Duration>>>>,

	/// The arguments of `close_idle_connections` calls.
	idle_closes: Mutex<Vec<Duration>>,

	/// The number of `close_expired_connections` calls.
	expired_closes: AtomicUsize,

	/// The number of `shutdown` calls.
	shutdowns: AtomicUsize,
}

impl RecordingManager {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_scripts(scripts: &[&[u8]]) -> Self {
		Self {
			scripts: Mutex::new(scripts.iter().map(|s| s.to_vec()).collect()),
			..Self::default()
		}
	}

	pub fn refusing() -> Self {
		Self {
			refuse: true,
			..Self::default()
		}
	}

	pub fn leases(&self) -> Vec<Route> {
		self.leases.lock().clone()
	}

	pub fn releases(&self) -> Vec<Disposition> {
		self.releases.lock().clone()
	}

	pub fn written(&self) -> Vec<u8> {
		self.written.lock().clone()
	}

	pub fn socket_timeouts(&self) -> Vec<Option<Duration>> {
		self.socket_timeouts.lock().clone()
	}

	pub fn idle_closes(&self) -> Vec<Duration> {
		self.idle_closes.lock().clone()
	}

	pub fn expired_closes(&self) -> usize {
		self.expired_closes.load(Ordering::SeqCst)
	}

	pub fn shutdowns(&self) -> usize {
		self.shutdowns.load(Ordering::SeqCst)
	}
}

impl ConnectionManager for RecordingManager {
	fn lease(
		&self,
		route: &Route,
		_config: &RequestConfig,
	) -> std::result::Result<Box<dyn ManagedConnection>, ConnectError> {
		if self.refuse {
			return Err(std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into());
		}
		self.leases.lock().push(route.clone());
		let script = self.scripts.lock().pop_front().unwrap_or_default();
		Ok(Box::new(
			MockConnection::new(script)
				.with_output(self.written.clone())
				.with_timeout_log(self.socket_timeouts.clone()),
		))
	}

	fn release(&self, mut connection: Box<dyn ManagedConnection>, disposition: Disposition) {
		if disposition == Disposition::Discard {
			let _ = connection.close();
		}
		self.releases.lock().push(disposition);
	}

	fn close_idle_connections(&self, max_idle: Duration) {
		self.idle_closes.lock().push(max_idle);
	}

	fn close_expired_connections(&self) {
		let _ = self.expired_closes.fetch_add(1, Ordering::SeqCst);
	}

	fn shutdown(&self) {
		let _ = self.shutdowns.fetch_add(1, Ordering::SeqCst);
	}
}
