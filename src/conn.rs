//! The connection manager capability and the release trigger built on top of it.

mod basic;
mod tcp;

pub use basic::BasicConnectionManager;
pub use tcp::{Connector, TcpConnection, TcpConnector};

use crate::config::RequestConfig;
use crate::error::ConnectError;
use crate::route::Route;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

/// A connection leased from a [`ConnectionManager`].
///
/// The connection is read through [`BufRead`] and written through [`Write`]. While leased it is
/// owned by exactly one request execution.
pub trait ManagedConnection: BufRead + Write + Send + std::fmt::Debug {
	/// Returns whether the connection is still open.
	fn is_open(&self) -> bool;

	/// Sets the timeout for blocking reads; `None` blocks indefinitely.
	///
	/// # Errors
	/// This function returns an error if the underlying transport rejects the timeout.
	fn set_socket_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()>;

	/// Closes the connection. Closing an already-closed connection does nothing.
	///
	/// # Errors
	/// This function returns an error if flushing or shutting down the transport fails; the
	/// connection is considered closed regardless.
	fn close(&mut self) -> std::io::Result<()>;
}

/// How a connection is handed back to its manager.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
	/// The connection may serve another request on the same route.
	Reusable {
		/// How long the connection may stay idle before it becomes invalid; `None` means it does
		/// not expire.
		valid_for: Option<Duration>,
	},

	/// The connection must be closed and never leased again.
	Discard,
}

/// Leases connections for routes and takes them back.
///
/// The manager is the only synchronization point between concurrent executions: `lease` may block
/// until a connection becomes available, bounded by the configuration’s connection request
/// timeout.
pub trait ConnectionManager: Send + Sync + std::fmt::Debug {
	/// Leases an open connection for a route.
	///
	/// # Errors
	/// This function returns an error if the manager has been shut down, if no connection becomes
	/// available in time, or if opening a new connection fails.
	fn lease(
		&self,
		route: &Route,
		config: &RequestConfig,
	) -> Result<Box<dyn ManagedConnection>, ConnectError>;

	/// Takes back a connection that was previously leased.
	///
	/// A discarded connection is closed by the manager.
	fn release(&self, connection: Box<dyn ManagedConnection>, disposition: Disposition);

	/// Closes connections that have been idle for at least `max_idle`.
	fn close_idle_connections(&self, max_idle: Duration);

	/// Closes connections whose validity period has elapsed.
	fn close_expired_connections(&self);

	/// Closes all connections and refuses further leases.
	fn shutdown(&self);
}

/// Owns a leased connection until it is handed back to its manager, exactly once.
///
/// The execution pipeline records the reuse decision here; the connection is then released either
/// straight away or, when the response body is streamed from the connection, once the body has
/// been read to its end. Any path that gives up on the connection instead discards it, and so does
/// dropping the holder while it still owns the connection.
#[derive(Debug)]
pub(crate) struct ConnectionHolder {
	/// The manager the connection was leased from.
	manager: Arc<dyn ConnectionManager>,

	/// The connection, until it is released.
	connection: Option<Box<dyn ManagedConnection>>,

	/// The disposition to use on a normal release.
	disposition: Disposition,
}

impl ConnectionHolder {
	pub(crate) fn new(
		manager: Arc<dyn ConnectionManager>,
		connection: Box<dyn ManagedConnection>,
	) -> Self {
		Self {
			manager,
			connection: Some(connection),
			disposition: Disposition::Discard,
		}
	}

	/// Returns the held connection, or a `NotConnected` error if it was already released.
	pub(crate) fn connection(&mut self) -> std::io::Result<&mut dyn ManagedConnection> {
		match self.connection.as_mut() {
			Some(connection) => Ok(connection.as_mut()),
			None => Err(std::io::ErrorKind::NotConnected.into()),
		}
	}

	pub(crate) fn mark_reusable(&mut self, valid_for: Option<Duration>) {
		self.disposition = Disposition::Reusable { valid_for };
	}

	pub(crate) fn mark_non_reusable(&mut self) {
		self.disposition = Disposition::Discard;
	}

	/// Hands the connection back with the recorded disposition.
	pub(crate) fn release_connection(&mut self) {
		if let Some(connection) = self.connection.take() {
			tracing::debug!(disposition = ?self.disposition, "releasing connection");
			self.manager.release(connection, self.disposition);
		}
	}

	/// Hands the connection back for closing, whatever was recorded.
	pub(crate) fn abort_connection(&mut self) {
		if let Some(connection) = self.connection.take() {
			tracing::debug!("discarding connection");
			self.manager.release(connection, Disposition::Discard);
		}
	}
}

impl Drop for ConnectionHolder {
	fn drop(&mut self) {
		self.abort_connection();
	}
}
