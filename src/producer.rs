//! Request bodies streamed from a source rather than held in memory.
//!
//! A [`ContentProducer`] is driven by the transport: each call to
//! [`produce`](ContentProducer::produce) moves the next piece of the body into a writer and
//! reports how many bytes are still to come. The [`ZeroCopyProducer`] does this for a file, moving
//! the file’s bytes to the writer one bounded chunk at a time, so the file is never staged in
//! memory as a whole.

use crate::request::{Entity, Request};
use crate::route::HttpHost;
use futures_core::ready;
use futures_io::AsyncWrite;
use http::header::HeaderValue;
use http::{Method, Uri};
use std::fmt::Debug;
use std::fs::File;
use std::future::Future;
use std::io::{ErrorKind, Read, Result, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

/// The most bytes moved from the file by one call to `produce`.
const CHUNK_SIZE: usize = 8192;

/// A source of request body bytes that the transport pulls from.
pub trait ContentProducer: Send + Debug {
	/// Returns the number of bytes the body consists of, if known in advance.
	///
	/// When this is `None`, the body is sent with chunked transfer coding.
	fn content_length(&self) -> Option<u64>;

	/// Returns the media type of the body, if known.
	fn content_type(&self) -> Option<&HeaderValue>;

	/// Returns whether [`reset`](Self::reset) can restart the body from the beginning.
	fn is_repeatable(&self) -> bool;

	/// Moves the next piece of the body into `writer`.
	///
	/// The return value is the number of bytes still to be produced; zero means the body is
	/// complete. A writer that cannot accept data right now (reporting
	/// [`WouldBlock`](ErrorKind::WouldBlock) or [`Interrupted`](ErrorKind::Interrupted)) is not an
	/// error: nothing is lost, and the call may simply be repeated later.
	///
	/// # Errors
	/// This function returns an error if the source cannot be read, if the writer fails, or if
	/// the producer has been closed.
	fn produce(&mut self, writer: &mut dyn Write) -> Result<u64>;

	/// Restarts the body from its first byte.
	///
	/// # Errors
	/// This function returns an error if the producer is not repeatable or has been closed.
	fn reset(&mut self) -> Result<()>;

	/// Releases the resources held by the producer. Closing twice does nothing.
	///
	/// # Errors
	/// This function returns an error if releasing the resources fails.
	fn close(&mut self) -> Result<()>;
}

/// The lifecycle of a producer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProducerState {
	/// Nothing has been produced since construction or the last reset.
	Idle,

	/// Some, but not all, of the body has been produced.
	Producing,

	/// The whole body has been produced.
	Completed,

	/// The producer has released its resources and cannot produce again.
	Closed,
}

/// The request method that encloses a producer’s body.
pub trait EnclosingMethod: Debug + Send + 'static {
	/// Returns the method.
	fn method() -> Method;
}

/// Selects `PUT` as the enclosing method.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Put;

impl EnclosingMethod for Put {
	fn method() -> Method {
		Method::PUT
	}
}

/// Selects `POST` as the enclosing method.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Post;

impl EnclosingMethod for Post {
	fn method() -> Method {
		Method::POST
	}
}

/// A producer that streams a file as the body of a request to a URI.
///
/// The file’s length is captured when the producer is constructed and is declared as the body’s
/// `Content-Length`. The file must not change size while the producer is in use: if it shrinks,
/// production fails with [`UnexpectedEof`](ErrorKind::UnexpectedEof); if it grows, only the
/// declared number of bytes is sent.
///
/// The file offset is the only record of progress, so after a writer refuses some bytes they are
/// simply read again on the next call.
#[derive(Debug)]
pub struct ZeroCopyProducer<M: EnclosingMethod> {
	/// The URI the request is sent to.
	uri: Uri,

	/// The path of the file.
	path: PathBuf,

	/// The open file, until the producer is closed.
	file: Option<File>,

	/// The file’s length at construction.
	length: u64,

	/// The media type of the file.
	content_type: Option<HeaderValue>,

	/// The current state.
	state: ProducerState,

	/// The enclosing method.
	method: PhantomData<fn() -> M>,
}

/// A producer for a `PUT` request.
pub type ZeroCopyPut = ZeroCopyProducer<Put>;

/// A producer for a `POST` request.
pub type ZeroCopyPost = ZeroCopyProducer<Post>;

impl<M: EnclosingMethod> ZeroCopyProducer<M> {
	/// Opens `path` as the body of a request to `uri`.
	///
	/// # Errors
	/// This function returns [`Error::FileNotFound`](crate::Error::FileNotFound) if the file does
	/// not exist, cannot be opened for reading, or is not a regular file. No file handle remains
	/// open in that case.
	pub fn new(
		uri: Uri,
		path: impl AsRef<Path>,
		content_type: Option<HeaderValue>,
	) -> std::result::Result<Self, crate::Error> {
		let path = path.as_ref().to_owned();
		let opened = File::open(&path).and_then(|file| {
			let metadata = file.metadata()?;
			if metadata.is_file() {
				Ok((file, metadata.len()))
			} else {
				Err(std::io::Error::new(
					ErrorKind::InvalidInput,
					"not a regular file",
				))
			}
		});
		let (file, length) = match opened {
			Ok(opened) => opened,
			Err(source) => return Err(crate::Error::FileNotFound { path, source }),
		};
		tracing::trace!(path = %path.display(), length, "opened producer file");
		Ok(Self {
			uri,
			path,
			file: Some(file),
			length,
			content_type,
			state: ProducerState::Idle,
			method: PhantomData,
		})
	}

	/// Opens `path` as the body of a request to `uri`, given in any form that converts into a
	/// [`Uri`], such as a string.
	///
	/// # Errors
	/// This function returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if `uri`
	/// is not a valid URI, and otherwise fails as [`new`](Self::new) does.
	pub fn try_new<U>(
		uri: U,
		path: impl AsRef<Path>,
		content_type: Option<HeaderValue>,
	) -> std::result::Result<Self, crate::Error>
	where
		Uri: TryFrom<U>,
	{
		let uri = Uri::try_from(uri).map_err(|_| crate::Error::InvalidArgument("Request URI"))?;
		Self::new(uri, path, content_type)
	}

	/// Returns the URI the request is sent to.
	#[must_use]
	pub fn uri(&self) -> &Uri {
		&self.uri
	}

	/// Returns the host the request is sent to, if the URI names one.
	#[must_use]
	pub fn target(&self) -> Option<HttpHost> {
		HttpHost::from_uri(&self.uri)
	}

	/// Returns the path of the file.
	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Returns the current state.
	#[must_use]
	pub fn state(&self) -> ProducerState {
		self.state
	}

	/// Builds the request that carries this producer as its body.
	#[must_use]
	pub fn generate_request(self) -> Request {
		Request::builder(M::method(), self.uri.clone())
			.entity(Entity::Producer(Box::new(self)))
			.build()
	}

	/// Returns the open file, or an error if the producer has been closed.
	fn file(&mut self) -> Result<&mut File> {
		self.file
			.as_mut()
			.ok_or_else(|| std::io::Error::new(ErrorKind::Other, "content producer is closed"))
	}

	/// Reads the next chunk of the file into `buffer`.
	///
	/// Returns the number of bytes read, which is zero only when the declared length has been
	/// reached.
	fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize> {
		let length = self.length;
		let file = self.file()?;
		let position = file.stream_position()?;
		let remaining = length.saturating_sub(position);
		if remaining == 0 {
			self.state = ProducerState::Completed;
			return Ok(0);
		}
		let to_read = std::cmp::min(remaining, buffer.len() as u64) as usize;
		let bytes_read = file.read(&mut buffer[..to_read])?;
		if bytes_read == 0 {
			return Err(std::io::Error::new(
				ErrorKind::UnexpectedEof,
				"file is shorter than its declared length",
			));
		}
		Ok(bytes_read)
	}

	/// Moves the file offset back over bytes that were read but not written, updates the state
	/// from the resulting offset, then returns the number of bytes still to be produced.
	///
	/// An offset of zero leaves the state alone, since nothing has reached the writer yet.
	fn settle(&mut self, unwritten: usize) -> Result<u64> {
		let length = self.length;
		let file = self.file()?;
		if unwritten != 0 {
			let _ = file.seek(SeekFrom::Current(-(unwritten as i64)))?;
		}
		let position = file.stream_position()?;
		let remaining = length.saturating_sub(position);
		if remaining == 0 {
			self.state = ProducerState::Completed;
		} else if position != 0 {
			self.state = ProducerState::Producing;
		}
		Ok(remaining)
	}

	/// Moves the next piece of the file into an asynchronous writer.
	///
	/// This is the asynchronous counterpart of [`produce`](ContentProducer::produce): a writer
	/// returning [`Poll::Pending`] is applying backpressure, and the bytes it refused are read
	/// again from the file when this function is next polled.
	///
	/// # Errors
	/// This function returns an error under the same conditions as `produce`.
	pub fn poll_produce<W: AsyncWrite + ?Sized>(
		&mut self,
		cx: &mut Context<'_>,
		writer: Pin<&mut W>,
	) -> Poll<Result<u64>> {
		let mut buffer = [0_u8; CHUNK_SIZE];
		let bytes_read = self.read_chunk(&mut buffer)?;
		if bytes_read == 0 {
			return Poll::Ready(Ok(0));
		}
		match writer.poll_write(cx, &buffer[..bytes_read]) {
			Poll::Pending => {
				let _ = self.settle(bytes_read)?;
				Poll::Pending
			}
			Poll::Ready(Ok(0)) => {
				let _ = self.settle(bytes_read)?;
				Poll::Ready(Err(ErrorKind::WriteZero.into()))
			}
			Poll::Ready(Ok(written)) => Poll::Ready(self.settle(bytes_read - written)),
			Poll::Ready(Err(e)) => {
				let _ = self.settle(bytes_read)?;
				Poll::Ready(Err(e))
			}
		}
	}

	/// Moves the next piece of the file into an asynchronous writer, waiting while the writer
	/// applies backpressure.
	pub fn produce_async<'a, W: AsyncWrite + ?Sized>(
		&'a mut self,
		writer: Pin<&'a mut W>,
	) -> ProduceFuture<'a, M, W> {
		ProduceFuture {
			producer: self,
			writer,
		}
	}
}

impl<M: EnclosingMethod> ContentProducer for ZeroCopyProducer<M> {
	fn content_length(&self) -> Option<u64> {
		Some(self.length)
	}

	fn content_type(&self) -> Option<&HeaderValue> {
		self.content_type.as_ref()
	}

	fn is_repeatable(&self) -> bool {
		true
	}

	fn produce(&mut self, writer: &mut dyn Write) -> Result<u64> {
		let mut buffer = [0_u8; CHUNK_SIZE];
		let bytes_read = self.read_chunk(&mut buffer)?;
		if bytes_read == 0 {
			return Ok(0);
		}
		match writer.write(&buffer[..bytes_read]) {
			Ok(0) => {
				let _ = self.settle(bytes_read)?;
				Err(ErrorKind::WriteZero.into())
			}
			Ok(written) => self.settle(bytes_read - written),
			Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
				self.settle(bytes_read)
			}
			Err(e) => {
				let _ = self.settle(bytes_read)?;
				Err(e)
			}
		}
	}

	fn reset(&mut self) -> Result<()> {
		let _ = self.file()?.seek(SeekFrom::Start(0))?;
		self.state = ProducerState::Idle;
		tracing::trace!(path = %self.path.display(), "producer reset");
		Ok(())
	}

	fn close(&mut self) -> Result<()> {
		if self.file.take().is_some() {
			tracing::trace!(path = %self.path.display(), "producer closed");
		}
		self.state = ProducerState::Closed;
		Ok(())
	}
}

/// A future that moves the next piece of a file into an asynchronous writer.
#[derive(Debug)]
pub struct ProduceFuture<'a, M: EnclosingMethod, W: AsyncWrite + ?Sized> {
	producer: &'a mut ZeroCopyProducer<M>,
	writer: Pin<&'a mut W>,
}

impl<M: EnclosingMethod, W: AsyncWrite + ?Sized> Future for ProduceFuture<'_, M, W> {
	type Output = Result<u64>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let this = self.get_mut();
		let remaining = ready!(this.producer.poll_produce(cx, this.writer.as_mut()))?;
		Poll::Ready(Ok(remaining))
	}
}
