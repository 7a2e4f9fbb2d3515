//! The request execution pipeline.

use crate::config::HttpContext;
use crate::conn::{ConnectionHolder, ConnectionManager};
use crate::error::{Error, ProtocolError};
use crate::exchange::{Http1Exchange, ProtocolExchange};
use crate::request::RequestWrapper;
use crate::response::{Response, ResponseBody};
use crate::route::Route;
use crate::strategy::{
	ConnectionKeepAliveStrategy, ConnectionReuseStrategy, DefaultConnectionKeepAliveStrategy,
	DefaultConnectionReuseStrategy,
};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Executes one request over a connection leased for its route.
///
/// The pipeline leases a connection, runs the exchange, asks the reuse strategy (and, if the
/// connection is reusable, the keep-alive strategy) about the response, and hands the connection
/// back to the manager exactly once. When the response has a body, the hand-back happens when the
/// body has been read to its end, or, as a discard, when the response is closed or dropped first.
///
/// Abort, signalled through the request’s [`AbortHandle`](crate::AbortHandle), is checked before
/// the lease, before the request is sent, and before the reuse decision.
///
/// The pipeline holds no locks; one instance may run any number of executions concurrently.
pub struct MinimalClientExec {
	/// Runs the wire exchange.
	exchange: Box<dyn ProtocolExchange>,

	/// Leases and takes back connections.
	manager: Arc<dyn ConnectionManager>,

	/// Decides whether a connection may be reused.
	reuse_strategy: Box<dyn ConnectionReuseStrategy>,

	/// Decides how long a reusable connection stays valid.
	keep_alive_strategy: Box<dyn ConnectionKeepAliveStrategy>,
}

impl MinimalClientExec {
	/// Constructs a pipeline from its collaborators.
	#[must_use]
	pub fn new(
		exchange: Box<dyn ProtocolExchange>,
		manager: Arc<dyn ConnectionManager>,
		reuse_strategy: Box<dyn ConnectionReuseStrategy>,
		keep_alive_strategy: Box<dyn ConnectionKeepAliveStrategy>,
	) -> Self {
		Self {
			exchange,
			manager,
			reuse_strategy,
			keep_alive_strategy,
		}
	}

	/// Constructs a pipeline using the HTTP/1.1 exchange and the default strategies.
	#[must_use]
	pub fn with_defaults(manager: Arc<dyn ConnectionManager>) -> Self {
		Self::new(
			Box::new(Http1Exchange),
			manager,
			Box::new(DefaultConnectionReuseStrategy),
			Box::new(DefaultConnectionKeepAliveStrategy),
		)
	}

	/// Returns the connection manager.
	#[must_use]
	pub fn connection_manager(&self) -> &Arc<dyn ConnectionManager> {
		&self.manager
	}

	/// Executes `request` over a connection for `route`.
	///
	/// The request entity, if any, is closed before this function returns, whatever the outcome.
	///
	/// # Errors
	/// * [`Error::Connectivity`] if no connection could be leased; nothing is released
	/// * [`Error::Protocol`] if the exchange failed; the connection has been discarded
	/// * [`Error::Cancelled`] if abort was signalled; any leased connection has been discarded
	pub fn execute(
		&self,
		route: &Route,
		mut request: RequestWrapper,
		context: &mut HttpContext,
	) -> Result<Response, Error> {
		context.set_route(route.clone());
		let config = context.request_config().cloned().unwrap_or_default();

		if request.is_aborted() {
			request.close_entity();
			return Err(Error::Cancelled);
		}

		tracing::debug!(%route, "leasing connection");
		let connection = match self.manager.lease(route, &config) {
			Ok(connection) => connection,
			Err(e) => {
				tracing::debug!(%route, error = %e, "lease failed");
				request.close_entity();
				return Err(e.into());
			}
		};
		let mut holder = ConnectionHolder::new(Arc::clone(&self.manager), connection);

		if request.is_aborted() {
			holder.abort_connection();
			request.close_entity();
			return Err(Error::Cancelled);
		}

		let result = holder
			.connection()
			.map_err(ProtocolError::from)
			.and_then(|connection| {
				connection.set_socket_timeout(config.socket_timeout)?;
				self.exchange.execute(&mut request, connection, context)
			});
		request.close_entity();
		let head = match result {
			Ok(head) => head,
			Err(e) => {
				tracing::debug!(%route, error = %e, "exchange failed");
				holder.abort_connection();
				return Err(Error::Protocol(e));
			}
		};

		if request.is_aborted() {
			holder.abort_connection();
			return Err(Error::Cancelled);
		}

		if self.reuse_strategy.keep_alive(&head, context) {
			let valid_for = self.keep_alive_strategy.keep_alive_duration(&head, context);
			tracing::debug!(%route, keep_alive = true, ?valid_for, "reuse decision");
			holder.mark_reusable(valid_for);
		} else {
			tracing::debug!(%route, keep_alive = false, "reuse decision");
			holder.mark_non_reusable();
		}

		let body = if head.has_body() {
			ResponseBody::streamed(head.framing, holder)
		} else {
			holder.release_connection();
			ResponseBody::empty()
		};
		Ok(Response::new(head, body))
	}
}

impl Debug for MinimalClientExec {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MinimalClientExec")
			.field("manager", &self.manager)
			.finish_non_exhaustive()
	}
}
