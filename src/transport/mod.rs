//! Transport module - endpoint parsing and byte-stream connectors.
//!
//! Provides abstraction over:
//! - TCP sockets (`tcp://host:port` or bare `host:port`)
//! - Unix Domain Sockets (`ipc:///path`, Linux/macOS)
//! - Any other `AsyncRead + AsyncWrite` stream via [`Connector`]

mod connector;
mod endpoint;

pub use connector::{AsyncStream, BoxFuture, BoxedStream, Connector, DefaultConnector};
pub use endpoint::Endpoint;
