use super::{ConnectionManager, Connector, Disposition, ManagedConnection, TcpConnector};
use crate::config::RequestConfig;
use crate::error::ConnectError;
use crate::route::Route;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// The manager’s view of its single connection while it is idle.
#[derive(Debug)]
struct Pooled {
	/// The route the connection was opened for.
	route: Route,

	/// The idle connection.
	connection: Box<dyn ManagedConnection>,

	/// When the connection was last returned.
	updated: Instant,

	/// When the connection stops being valid, if ever.
	expiry: Option<Instant>,
}

/// The mutable state of a [`BasicConnectionManager`].
#[derive(Debug, Default)]
struct State {
	/// The idle connection, if one is kept.
	idle: Option<Pooled>,

	/// The route of the leased connection, while the connection is leased.
	leased: Option<Route>,

	/// Whether [`shutdown`](ConnectionManager::shutdown) has been called.
	shutdown: bool,
}

/// A connection manager that maintains at most one connection.
///
/// The connection is kept after a reusable release and handed out again to the next lease for an
/// equal route, as long as it is still open and its validity period has not elapsed. A lease for a
/// different route closes the kept connection and opens a new one. While the connection is leased,
/// further leases wait for it to come back, up to the configured connection request timeout.
#[derive(Debug)]
pub struct BasicConnectionManager {
	/// Opens new connections.
	connector: Box<dyn Connector>,

	/// The connection state.
	state: Mutex<State>,

	/// Signalled whenever the connection is returned or the manager shuts down.
	returned: Condvar,
}

impl BasicConnectionManager {
	/// Constructs a manager that opens plain-text TCP connections.
	#[must_use]
	pub fn new() -> Self {
		Self::with_connector(Box::new(TcpConnector))
	}

	/// Constructs a manager that opens connections through `connector`.
	#[must_use]
	pub fn with_connector(connector: Box<dyn Connector>) -> Self {
		Self {
			connector,
			state: Mutex::new(State::default()),
			returned: Condvar::new(),
		}
	}

	/// Closes a connection, logging rather than reporting failure.
	fn close_quietly(route: &Route, connection: &mut dyn ManagedConnection, reason: &'static str) {
		tracing::debug!(%route, reason, "closing connection");
		if let Err(e) = connection.close() {
			tracing::debug!(%route, error = %e, "error closing connection");
		}
	}

	/// Waits until the connection is not leased, then marks it leased for `route` and takes the
	/// idle connection, if any.
	fn acquire(
		&self,
		route: &Route,
		deadline: Option<Instant>,
	) -> Result<Option<Pooled>, ConnectError> {
		let mut state = self.state.lock();
		loop {
			if state.shutdown {
				return Err(ConnectError::Shutdown);
			}
			if state.leased.is_none() {
				state.leased = Some(route.clone());
				return Ok(state.idle.take());
			}
			match deadline {
				Some(deadline) => {
					if self.returned.wait_until(&mut state, deadline).timed_out()
						&& state.leased.is_some()
						&& !state.shutdown
					{
						return Err(ConnectError::Timeout);
					}
				}
				None => self.returned.wait(&mut state),
			}
		}
	}
}

impl Default for BasicConnectionManager {
	fn default() -> Self {
		Self::new()
	}
}

impl ConnectionManager for BasicConnectionManager {
	fn lease(
		&self,
		route: &Route,
		config: &RequestConfig,
	) -> Result<Box<dyn ManagedConnection>, ConnectError> {
		let deadline = config
			.connection_request_timeout
			.map(|timeout| Instant::now() + timeout);
		let idle = self.acquire(route, deadline)?;

		// The lease is held from here on, so the kept connection can be inspected and a new one
		// opened without the lock.
		if let Some(mut pooled) = idle {
			if pooled.route != *route {
				Self::close_quietly(&pooled.route, pooled.connection.as_mut(), "route changed");
			} else if pooled.expiry.map_or(false, |expiry| expiry <= Instant::now()) {
				Self::close_quietly(&pooled.route, pooled.connection.as_mut(), "expired");
			} else if !pooled.connection.is_open() {
				tracing::debug!(%route, "kept connection was closed");
			} else {
				tracing::debug!(%route, "reusing connection");
				return Ok(pooled.connection);
			}
		}
		match self.connector.connect(route, config.connect_timeout) {
			Ok(connection) => Ok(connection),
			Err(e) => {
				self.state.lock().leased = None;
				let _ = self.returned.notify_one();
				Err(e)
			}
		}
	}

	fn release(&self, mut connection: Box<dyn ManagedConnection>, disposition: Disposition) {
		let mut state = self.state.lock();
		let route = state.leased.take();
		match (disposition, route) {
			(Disposition::Reusable { valid_for }, Some(route))
				if !state.shutdown && connection.is_open() =>
			{
				let updated = Instant::now();
				// A validity period too large to represent does not expire.
				let expiry = valid_for.and_then(|valid_for| updated.checked_add(valid_for));
				tracing::debug!(%route, ?valid_for, "keeping connection");
				state.idle = Some(Pooled {
					route,
					connection,
					updated,
					expiry,
				});
			}
			(_, route) => {
				let route = route.map_or_else(|| "<unknown>".to_owned(), |r| r.to_string());
				tracing::debug!(%route, "closing released connection");
				if let Err(e) = connection.close() {
					tracing::debug!(%route, error = %e, "error closing connection");
				}
			}
		}
		drop(state);
		let _ = self.returned.notify_one();
	}

	fn close_idle_connections(&self, max_idle: Duration) {
		let mut state = self.state.lock();
		if state
			.idle
			.as_ref()
			.map_or(false, |pooled| pooled.updated.elapsed() >= max_idle)
		{
			if let Some(mut pooled) = state.idle.take() {
				Self::close_quietly(&pooled.route, pooled.connection.as_mut(), "idle");
			}
		}
	}

	fn close_expired_connections(&self) {
		let mut state = self.state.lock();
		let now = Instant::now();
		if state
			.idle
			.as_ref()
			.and_then(|pooled| pooled.expiry)
			.map_or(false, |expiry| expiry <= now)
		{
			if let Some(mut pooled) = state.idle.take() {
				Self::close_quietly(&pooled.route, pooled.connection.as_mut(), "expired");
			}
		}
	}

	fn shutdown(&self) {
		let mut state = self.state.lock();
		if !state.shutdown {
			tracing::debug!("shutting down connection manager");
			state.shutdown = true;
		}
		if let Some(mut pooled) = state.idle.take() {
			Self::close_quietly(&pooled.route, pooled.connection.as_mut(), "shutdown");
		}
		drop(state);
		let _ = self.returned.notify_all();
	}
}
