#![forbid(unsafe_code)]
#![warn(
	future_incompatible,
	nonstandard_style,
	rust_2018_idioms,
	rustdoc,
	unused
)]
#![warn(
	deprecated_in_future,
	missing_crate_level_docs,
	missing_debug_implementations,
	missing_docs,
	missing_doc_code_examples,
	// Disabled due to <https://github.com/rust-lang/rust/issues/69952> and
	// <https://github.com/rust-lang/rust/issues/77217>.
	// single_use_lifetimes,
	trivial_casts,
	trivial_numeric_casts,
	unused_crate_dependencies,
	unused_import_braces,
	// Disabled due to <https://github.com/rust-lang/rust/issues/77217>.
	// unused_lifetimes,
	unused_qualifications,
	unused_results
)]
#![warn(clippy::pedantic, clippy::cargo)]
// Disabled because we frequently mix u64 and usize, where the former is used for message body
// lengths and the latter for in-memory buffer sizes.
#![allow(clippy::cast_possible_truncation)]

//! Synchronous HTTP Client core
//!
//! This crate executes HTTP/1.1 requests over connections leased from a pluggable
//! [`ConnectionManager`]. Each execution resolves a [`Route`] for the target host, leases a
//! connection for it, runs the wire exchange, and asks two strategy objects whether the connection
//! may be reused ([`ConnectionReuseStrategy`]) and for how long ([`ConnectionKeepAliveStrategy`]).
//! Every leased connection is handed back to its manager exactly once: as soon as the response has
//! no more body to read, or as a discard if the exchange fails, the request is aborted, or the
//! response is dropped before its body ends.
//!
//! Request bodies can be held in memory or streamed by a [`ContentProducer`]. The
//! [`ZeroCopyProducer`] streams a file into the request one bounded chunk at a time.
//!
//! # Example
//! ```no_run
//! use std::io::Read as _;
//! use std::sync::Arc;
//!
//! let client = sahc::MinimalHttpClient::new(Arc::new(sahc::BasicConnectionManager::new()));
//!
//! // Upload a file.
//! let upload = sahc::ZeroCopyPut::new(
//!		"http://example.com/upload".parse().unwrap(),
//!		"/tmp/data.bin",
//!		Some(http::HeaderValue::from_static("application/octet-stream")),
//! )
//! .unwrap();
//! let response = client.execute(upload.generate_request()).unwrap();
//! assert!(response.status().is_success());
//! drop(response);
//!
//! // Fetch a page over the same connection.
//! let request = sahc::Request::get("http://example.com/".parse().unwrap());
//! let mut response = client.execute(request).unwrap();
//! let mut body = String::new();
//! response.read_to_string(&mut body).unwrap();
//! ```

mod client;
mod config;
mod conn;
#[cfg(feature = "detailed-errors")]
pub mod error;
#[cfg(not(feature = "detailed-errors"))]
mod error;
mod exchange;
mod exec;
mod producer;
mod request;
mod response;
mod route;
mod strategy;
mod util;

pub use client::{ClientConnectionManager, LegacyConnectionManager, MinimalHttpClient};
pub use config::{HttpContext, RequestConfig};
pub use conn::{
	BasicConnectionManager, ConnectionManager, Connector, Disposition, ManagedConnection,
	TcpConnection, TcpConnector,
};
pub use error::{ConnectError, Error, ProtocolError};
pub use exchange::{Http1Exchange, ProtocolExchange};
pub use exec::MinimalClientExec;
pub use producer::{
	ContentProducer, EnclosingMethod, Post, ProduceFuture, ProducerState, Put, ZeroCopyPost,
	ZeroCopyProducer, ZeroCopyPut,
};
pub use request::{AbortHandle, Entity, Request, RequestBuilder, RequestWrapper};
pub use response::{Framing, Response, ResponseBody, ResponseHead};
pub use route::{HttpHost, Route, Scheme};
pub use strategy::{
	ConnectionKeepAliveStrategy, ConnectionReuseStrategy, DefaultConnectionKeepAliveStrategy,
	DefaultConnectionReuseStrategy, NoConnectionReuseStrategy,
};
