use super::ManagedConnection;
use crate::error::ConnectError;
use crate::route::{Route, Scheme};
use std::io::{BufRead, BufReader, BufWriter, Read, Result, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Opens new connections for a connection manager.
pub trait Connector: Send + Sync + std::fmt::Debug {
	/// Opens a connection along a route.
	///
	/// # Errors
	/// This function returns an error if the route cannot be served or the connection cannot be
	/// established within `connect_timeout`.
	fn connect(
		&self,
		route: &Route,
		connect_timeout: Option<Duration>,
	) -> std::result::Result<Box<dyn ManagedConnection>, ConnectError>;
}

/// A [`Connector`] that opens plain-text TCP connections.
///
/// TLS is not provided; routes with the `https` scheme are refused with
/// [`ConnectError::UnsupportedScheme`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
	fn connect(
		&self,
		route: &Route,
		connect_timeout: Option<Duration>,
	) -> std::result::Result<Box<dyn ManagedConnection>, ConnectError> {
		if route.scheme() != Scheme::Http {
			return Err(ConnectError::UnsupportedScheme(route.scheme()));
		}
		// An IPv6 literal keeps its brackets in the route, as in the URI authority.
		let host = route
			.host()
			.strip_prefix('[')
			.and_then(|host| host.strip_suffix(']'))
			.unwrap_or_else(|| route.host());
		let mut last_error = None;
		for addr in (host, route.port()).to_socket_addrs()? {
			let attempt = match connect_timeout {
				Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
				None => TcpStream::connect(addr),
			};
			match attempt {
				Ok(stream) => {
					tracing::debug!(%route, %addr, "connected");
					return Ok(Box::new(TcpConnection::new(stream)?));
				}
				Err(e) => {
					tracing::debug!(%route, %addr, error = %e, "connect attempt failed");
					last_error = Some(e);
				}
			}
		}
		Err(last_error
			.unwrap_or_else(|| std::io::ErrorKind::AddrNotAvailable.into())
			.into())
	}
}

/// A plain-text TCP connection with buffered reads and writes.
#[derive(Debug)]
pub struct TcpConnection {
	/// The read half, buffered so that response heads can be parsed without over-reading.
	reader: BufReader<TcpStream>,

	/// The write half, buffered so that request heads go out in as few segments as possible.
	writer: BufWriter<TcpStream>,

	/// Whether [`close`](ManagedConnection::close) has been called.
	open: bool,
}

impl TcpConnection {
	/// Wraps a connected stream.
	///
	/// # Errors
	/// This function returns an error if the stream cannot be duplicated into read and write
	/// halves.
	pub fn new(stream: TcpStream) -> Result<Self> {
		let writer = BufWriter::new(stream.try_clone()?);
		Ok(Self {
			reader: BufReader::new(stream),
			writer,
			open: true,
		})
	}
}

impl Read for TcpConnection {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		self.reader.read(buf)
	}
}

impl BufRead for TcpConnection {
	fn fill_buf(&mut self) -> Result<&[u8]> {
		self.reader.fill_buf()
	}

	fn consume(&mut self, amt: usize) {
		self.reader.consume(amt);
	}
}

impl Write for TcpConnection {
	fn write(&mut self, buf: &[u8]) -> Result<usize> {
		self.writer.write(buf)
	}

	fn flush(&mut self) -> Result<()> {
		self.writer.flush()
	}
}

impl ManagedConnection for TcpConnection {
	fn is_open(&self) -> bool {
		self.open
	}

	fn set_socket_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
		self.reader.get_ref().set_read_timeout(timeout)
	}

	fn close(&mut self) -> Result<()> {
		if !self.open {
			return Ok(());
		}
		self.open = false;
		let flushed = self.writer.flush();
		let shut = match self.reader.get_ref().shutdown(Shutdown::Both) {
			Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
			other => other,
		};
		flushed.and(shut)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::net::TcpListener;

	/// Tests that the connector refuses routes it cannot secure.
	#[test]
	fn test_https_unsupported() {
		let route = Route::new(&crate::HttpHost::new(Scheme::Https, "localhost", None));
		match TcpConnector.connect(&route, None) {
			Err(ConnectError::UnsupportedScheme(Scheme::Https)) => (),
			other => panic!("Expected UnsupportedScheme, got {:?}", other),
		}
	}

	/// Tests connecting, writing, reading and closing over loopback.
	#[test]
	fn test_loopback() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		let server = std::thread::spawn(move || {
			let (mut socket, _) = listener.accept().unwrap();
			let mut request = [0_u8; 4];
			socket.read_exact(&mut request).unwrap();
			socket.write_all(b"pong").unwrap();
			request
		});
		let route = Route::new(&crate::HttpHost::new(Scheme::Http, "127.0.0.1", Some(port)));
		let mut conn = TcpConnector
			.connect(&route, Some(Duration::from_secs(5)))
			.unwrap();
		conn.write_all(b"ping").unwrap();
		conn.flush().unwrap();
		let mut reply = [0_u8; 4];
		conn.read_exact(&mut reply).unwrap();
		assert_eq!(&reply, b"pong");
		assert_eq!(&server.join().unwrap(), b"ping");
		assert!(conn.is_open());
		conn.close().unwrap();
		assert!(!conn.is_open());
		conn.close().unwrap();
	}

	/// Tests connecting to an IPv6 literal target over loopback.
	#[test]
	fn test_loopback_ipv6() {
		// Hosts without IPv6 loopback have nothing to test.
		let Ok(listener) = TcpListener::bind("[::1]:0") else {
			return;
		};
		let port = listener.local_addr().unwrap().port();
		let server = std::thread::spawn(move || {
			let (mut socket, _) = listener.accept().unwrap();
			socket.write_all(b"v6").unwrap();
		});
		let uri: http::Uri = format!("http://[::1]:{}/x", port).parse().unwrap();
		let target = crate::HttpHost::from_uri(&uri).unwrap();
		assert_eq!(target.to_host_string(), format!("[::1]:{}", port));
		let mut conn = TcpConnector
			.connect(&Route::new(&target), Some(Duration::from_secs(5)))
			.unwrap();
		let mut reply = [0_u8; 2];
		conn.read_exact(&mut reply).unwrap();
		assert_eq!(&reply, b"v6");
		server.join().unwrap();
	}
}
