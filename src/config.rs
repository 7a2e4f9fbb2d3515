//! Per-request configuration and the per-execution context.

use crate::route::{HttpHost, Route};
use std::time::Duration;

/// Configuration that can accompany an individual request.
///
/// Every setting is optional; an unset timeout means “wait indefinitely”.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestConfig {
	/// How long to wait for the connection manager to hand out a connection.
	pub connection_request_timeout: Option<Duration>,

	/// How long to wait for a new connection to be established.
	pub connect_timeout: Option<Duration>,

	/// The read timeout applied to the leased connection before the request is sent.
	pub socket_timeout: Option<Duration>,

	/// The `User-Agent` to send when the request does not carry one.
	pub user_agent: Option<String>,
}

impl RequestConfig {
	/// Sets the connection request timeout.
	#[must_use]
	pub fn with_connection_request_timeout(mut self, timeout: Duration) -> Self {
		self.connection_request_timeout = Some(timeout);
		self
	}

	/// Sets the connect timeout.
	#[must_use]
	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = Some(timeout);
		self
	}

	/// Sets the socket timeout.
	#[must_use]
	pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
		self.socket_timeout = Some(timeout);
		self
	}

	/// Sets the default user agent.
	#[must_use]
	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());
		self
	}
}

/// State shared between the stages of one request execution.
///
/// A caller may pass its own context to observe what happened during an execution (for example,
/// which route was used and whether the request made it onto the wire). When no context is
/// supplied, the client creates a fresh one.
#[derive(Clone, Debug, Default)]
pub struct HttpContext {
	/// The configuration in effect.
	request_config: Option<RequestConfig>,

	/// The host the request is sent to.
	target: Option<HttpHost>,

	/// The route the request is sent over.
	route: Option<Route>,

	/// The request method.
	method: Option<http::Method>,

	/// Whether the request carried `Connection: close`.
	connection_close_requested: bool,

	/// Whether the request was fully written to the connection.
	request_sent: bool,
}

impl HttpContext {
	/// Constructs an empty context.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the configuration in effect, if one was installed.
	#[must_use]
	pub fn request_config(&self) -> Option<&RequestConfig> {
		self.request_config.as_ref()
	}

	/// Installs a configuration, replacing any previous one.
	pub fn set_request_config(&mut self, config: RequestConfig) {
		self.request_config = Some(config);
	}

	/// Returns the host the request is sent to.
	#[must_use]
	pub fn target(&self) -> Option<&HttpHost> {
		self.target.as_ref()
	}

	/// Returns the route the request is sent over.
	#[must_use]
	pub fn route(&self) -> Option<&Route> {
		self.route.as_ref()
	}

	/// Returns the request method.
	#[must_use]
	pub fn method(&self) -> Option<&http::Method> {
		self.method.as_ref()
	}

	/// Returns whether the request asked for the connection to be closed afterwards.
	#[must_use]
	pub fn connection_close_requested(&self) -> bool {
		self.connection_close_requested
	}

	/// Returns whether the request was fully written to the connection.
	#[must_use]
	pub fn is_request_sent(&self) -> bool {
		self.request_sent
	}

	pub(crate) fn set_target(&mut self, target: HttpHost) {
		self.target = Some(target);
	}

	pub(crate) fn set_route(&mut self, route: Route) {
		self.route = Some(route);
	}

	pub(crate) fn set_request(&mut self, method: http::Method, connection_close: bool) {
		self.method = Some(method);
		self.connection_close_requested = connection_close;
	}

	pub(crate) fn set_request_sent(&mut self, sent: bool) {
		self.request_sent = sent;
	}
}
