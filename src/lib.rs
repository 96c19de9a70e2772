//! # zmtp-client
//!
//! Rust subscriber client for the ZMTP 3.0 wire protocol.
//!
//! This crate connects to a ZeroMQ `PUB` socket using the NULL security
//! mechanism, subscribes to topics and delivers multipart messages.
//!
//! ## Architecture
//!
//! - **Protocol** (sans-IO): greeting, frame reader, command codec,
//!   reassembly of multipart messages
//! - **Supervisor** (Tokio task): owns the transport, resends every
//!   subscription after each handshake, reconnects after a fixed delay
//!
//! ## Example
//!
//! ```no_run
//! use zmtp_client::{Client, Event, EventKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder().build();
//!     let mut events = client.events();
//!
//!     client.subscribe("price");
//!     client.open("tcp://127.0.0.1:5556")?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let Event::Message(message) = event {
//!             println!("{:?}", message.to_strings_lossy());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod handshake;
pub mod message;
pub mod protocol;
pub mod session;
pub mod subscription;
pub mod transport;

mod client;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::{Result, ZmtpError};
pub use events::{Event, EventKind};
pub use message::Message;
pub use session::ConnectionState;
