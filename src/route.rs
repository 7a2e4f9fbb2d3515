//! Target hosts and the routes resolved from them.

use std::fmt::{Display, Formatter};

/// A URI scheme that this client knows how to route.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Scheme {
	/// Plain-text HTTP.
	Http,

	/// HTTP over TLS.
	Https,
}

impl Scheme {
	/// Returns the port used when a target does not name one.
	#[must_use]
	pub fn default_port(self) -> u16 {
		match self {
			Self::Http => 80,
			Self::Https => 443,
		}
	}

	/// Parses a scheme name, ignoring ASCII case.
	#[must_use]
	pub fn parse(name: &str) -> Option<Self> {
		if name.eq_ignore_ascii_case("http") {
			Some(Self::Http)
		} else if name.eq_ignore_ascii_case("https") {
			Some(Self::Https)
		} else {
			None
		}
	}

	/// Returns the lowercase scheme name.
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Http => "http",
			Self::Https => "https",
		}
	}
}

impl Display for Scheme {
	fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
		f.write_str(self.as_str())
	}
}

/// The host a request is sent to: a scheme, a host name, and an optional explicit port.
///
/// Host names are stored lowercase, so two targets that differ only in the case of their host
/// name are equal.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct HttpHost {
	/// The scheme.
	scheme: Scheme,

	/// The lowercase host name.
	hostname: String,

	/// The port, if one was given explicitly.
	port: Option<u16>,
}

impl HttpHost {
	/// Constructs a new target.
	#[must_use]
	pub fn new(scheme: Scheme, hostname: &str, port: Option<u16>) -> Self {
		Self {
			scheme,
			hostname: hostname.to_ascii_lowercase(),
			port,
		}
	}

	/// Extracts the target from an absolute URI.
	///
	/// Returns `None` if the URI is relative, has no host, or uses a scheme other than `http` or
	/// `https`.
	#[must_use]
	pub fn from_uri(uri: &http::Uri) -> Option<Self> {
		let scheme = Scheme::parse(uri.scheme_str()?)?;
		let host = uri.host().filter(|h| !h.is_empty())?;
		Some(Self::new(scheme, host, uri.port_u16()))
	}

	/// Returns the scheme.
	#[must_use]
	pub fn scheme(&self) -> Scheme {
		self.scheme
	}

	/// Returns the host name.
	#[must_use]
	pub fn hostname(&self) -> &str {
		&self.hostname
	}

	/// Returns the explicitly given port, if any.
	#[must_use]
	pub fn port(&self) -> Option<u16> {
		self.port
	}

	/// Returns the port that connections to this target use.
	#[must_use]
	pub fn effective_port(&self) -> u16 {
		self.port.unwrap_or_else(|| self.scheme.default_port())
	}

	/// Returns the value to send in a `Host` header: the host name, plus the port if one was given
	/// explicitly.
	#[must_use]
	pub fn to_host_string(&self) -> String {
		match self.port {
			Some(port) => format!("{}:{}", self.hostname, port),
			None => self.hostname.clone(),
		}
	}
}

impl Display for HttpHost {
	fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
		write!(f, "{}://{}", self.scheme, self.to_host_string())
	}
}

/// The network path to a target.
///
/// A route is derived once per request from the target host. It names the scheme, host, and the
/// effective port, so that two targets that differ only in whether the default port is spelled out
/// produce equal routes. This client does not route through proxies.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Route {
	/// The scheme.
	scheme: Scheme,

	/// The lowercase host name.
	host: String,

	/// The effective port.
	port: u16,
}

impl Route {
	/// Resolves the route to a target.
	#[must_use]
	pub fn new(target: &HttpHost) -> Self {
		Self {
			scheme: target.scheme(),
			host: target.hostname().to_owned(),
			port: target.effective_port(),
		}
	}

	/// Returns the scheme.
	#[must_use]
	pub fn scheme(&self) -> Scheme {
		self.scheme
	}

	/// Returns the host name.
	#[must_use]
	pub fn host(&self) -> &str {
		&self.host
	}

	/// Returns the port.
	#[must_use]
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Returns whether connections on this route must be secured with TLS.
	#[must_use]
	pub fn is_secure(&self) -> bool {
		self.scheme == Scheme::Https
	}
}

impl From<&HttpHost> for Route {
	fn from(target: &HttpHost) -> Self {
		Self::new(target)
	}
}

impl Display for Route {
	fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
		write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
	}
}
