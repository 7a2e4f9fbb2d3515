mod body;
mod headers;

pub(crate) use body::BodyWriter;
pub(crate) use headers::send as send_head;

use crate::config::RequestConfig;
use crate::producer::ContentProducer;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use std::io::{Result, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A handle through which an in-flight execution can be told to abort.
///
/// Clones share the same flag. Abort is advisory: the pipeline checks it before leasing a
/// connection, before sending the request, and before deciding on connection reuse, and discards
/// the connection if it is set.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle {
	aborted: Arc<AtomicBool>,
}

impl AbortHandle {
	/// Constructs a handle that has not been aborted.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Signals abort.
	pub fn abort(&self) {
		self.aborted.store(true, Ordering::SeqCst);
	}

	/// Returns whether abort has been signalled.
	#[must_use]
	pub fn is_aborted(&self) -> bool {
		self.aborted.load(Ordering::SeqCst)
	}
}

/// A request body.
#[derive(Debug)]
pub enum Entity {
	/// A body held in memory.
	Bytes {
		/// The body bytes.
		content: Vec<u8>,

		/// The media type of the body, if known.
		content_type: Option<HeaderValue>,
	},

	/// A body streamed from a producer.
	Producer(Box<dyn ContentProducer>),
}

impl Entity {
	/// Constructs an in-memory body.
	pub fn bytes(content: impl Into<Vec<u8>>, content_type: Option<HeaderValue>) -> Self {
		Self::Bytes {
			content: content.into(),
			content_type,
		}
	}

	/// Returns the length of the body, if known in advance.
	#[must_use]
	pub fn content_length(&self) -> Option<u64> {
		match self {
			Self::Bytes { content, .. } => Some(content.len() as u64),
			Self::Producer(producer) => producer.content_length(),
		}
	}

	/// Returns the media type of the body, if known.
	#[must_use]
	pub fn content_type(&self) -> Option<&HeaderValue> {
		match self {
			Self::Bytes { content_type, .. } => content_type.as_ref(),
			Self::Producer(producer) => producer.content_type(),
		}
	}

	/// Returns whether the body can be sent more than once.
	#[must_use]
	pub fn is_repeatable(&self) -> bool {
		match self {
			Self::Bytes { .. } => true,
			Self::Producer(producer) => producer.is_repeatable(),
		}
	}

	/// Writes the whole body to `writer`.
	///
	/// The writer is a blocking connection, so a write that would block has timed out.
	pub(crate) fn write_to(&mut self, writer: &mut dyn Write) -> Result<()> {
		match self {
			Self::Bytes { content, .. } => writer.write_all(content),
			Self::Producer(producer) => {
				let mut writer = Blocking(writer);
				while producer.produce(&mut writer)? != 0 {}
				Ok(())
			}
		}
	}

	/// Releases any resources held by the body.
	pub(crate) fn close(&mut self) -> Result<()> {
		match self {
			Self::Bytes { .. } => Ok(()),
			Self::Producer(producer) => producer.close(),
		}
	}
}

/// Adapts a blocking writer for a producer, which treats [`WouldBlock`](std::io::ErrorKind)
/// as backpressure. On a blocking connection a write only reports `WouldBlock` when its timeout
/// elapses.
struct Blocking<'a>(&'a mut dyn Write);

impl Write for Blocking<'_> {
	fn write(&mut self, buf: &[u8]) -> Result<usize> {
		self.0.write(buf).map_err(|e| {
			if e.kind() == std::io::ErrorKind::WouldBlock {
				std::io::Error::new(std::io::ErrorKind::TimedOut, e)
			} else {
				e
			}
		})
	}

	fn flush(&mut self) -> Result<()> {
		self.0.flush()
	}
}

/// An HTTP request.
///
/// A request is immutable once built. It carries an optional per-request configuration and an
/// optional [`AbortHandle`]; both are picked up by the client when the request is executed.
#[derive(Debug)]
pub struct Request {
	/// The method.
	method: Method,

	/// The target URI.
	uri: Uri,

	/// The request headers.
	headers: HeaderMap,

	/// The body, if any.
	entity: Option<Entity>,

	/// The per-request configuration, if any.
	config: Option<RequestConfig>,

	/// The abort handle, if the caller wants to be able to abort execution.
	abort: Option<AbortHandle>,
}

impl Request {
	/// Starts building a request.
	#[must_use]
	pub fn builder(method: Method, uri: Uri) -> RequestBuilder {
		RequestBuilder {
			request: Self {
				method,
				uri,
				headers: HeaderMap::new(),
				entity: None,
				config: None,
				abort: None,
			},
		}
	}

	/// Builds a `GET` request with no headers.
	#[must_use]
	pub fn get(uri: Uri) -> Self {
		Self::builder(Method::GET, uri).build()
	}

	/// Returns the method.
	#[must_use]
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Returns the target URI.
	#[must_use]
	pub fn uri(&self) -> &Uri {
		&self.uri
	}

	/// Returns the headers.
	#[must_use]
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Returns the body.
	#[must_use]
	pub fn entity(&self) -> Option<&Entity> {
		self.entity.as_ref()
	}

	/// Returns the per-request configuration.
	#[must_use]
	pub fn config(&self) -> Option<&RequestConfig> {
		self.config.as_ref()
	}

	/// Returns the abort handle.
	#[must_use]
	pub fn abort_handle(&self) -> Option<&AbortHandle> {
		self.abort.as_ref()
	}
}

/// Builds a [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
	request: Request,
}

impl RequestBuilder {
	/// Appends a header.
	#[must_use]
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		let _ = self.request.headers.append(name, value);
		self
	}

	/// Sets the body.
	#[must_use]
	pub fn entity(mut self, entity: Entity) -> Self {
		self.request.entity = Some(entity);
		self
	}

	/// Sets the per-request configuration.
	#[must_use]
	pub fn config(mut self, config: RequestConfig) -> Self {
		self.request.config = Some(config);
		self
	}

	/// Attaches an abort handle.
	#[must_use]
	pub fn abort_handle(mut self, abort: AbortHandle) -> Self {
		self.request.abort = Some(abort);
		self
	}

	/// Finishes building.
	#[must_use]
	pub fn build(self) -> Request {
		self.request
	}
}

/// A request as seen by the execution pipeline.
///
/// The wrapper keeps the original request and adds the request target rewritten to origin form
/// (path and query only, `/` when empty) along with a working copy of the headers, to which the
/// exchange adds the headers it derives.
#[derive(Debug)]
pub struct RequestWrapper {
	/// The original request.
	original: Request,

	/// The request target in origin form.
	request_target: String,

	/// The headers to send.
	headers: HeaderMap,
}

impl RequestWrapper {
	/// Wraps `request`.
	#[must_use]
	pub fn wrap(request: Request) -> Self {
		let request_target = match request.uri.path_and_query() {
			Some(pq) if !pq.as_str().is_empty() && pq.as_str() != "?" => {
				if pq.as_str().starts_with('/') || pq.as_str() == "*" {
					pq.as_str().to_owned()
				} else {
					format!("/{}", pq.as_str())
				}
			}
			_ => "/".to_owned(),
		};
		let headers = request.headers.clone();
		Self {
			original: request,
			request_target,
			headers,
		}
	}

	/// Returns the original request.
	#[must_use]
	pub fn original(&self) -> &Request {
		&self.original
	}

	/// Returns the method.
	#[must_use]
	pub fn method(&self) -> &Method {
		&self.original.method
	}

	/// Returns the request target in origin form.
	#[must_use]
	pub fn request_target(&self) -> &str {
		&self.request_target
	}

	/// Returns the headers to send.
	#[must_use]
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Returns the headers to send, for modification.
	pub fn headers_mut(&mut self) -> &mut HeaderMap {
		&mut self.headers
	}

	/// Returns the body.
	pub fn entity_mut(&mut self) -> Option<&mut Entity> {
		self.original.entity.as_mut()
	}

	/// Returns whether the caller has signalled abort.
	#[must_use]
	pub fn is_aborted(&self) -> bool {
		self.original
			.abort
			.as_ref()
			.map_or(false, AbortHandle::is_aborted)
	}

	/// Closes the body, if any, logging rather than reporting failure.
	pub(crate) fn close_entity(&mut self) {
		if let Some(entity) = self.original.entity.as_mut() {
			if let Err(e) = entity.close() {
				tracing::debug!(error = %e, "error closing request entity");
			}
		}
	}
}
