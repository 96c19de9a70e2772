//! Subscriber - print every message from a ZeroMQ publisher.
//!
//! This example demonstrates:
//! - Subscribing to topics before the connection is open
//! - Receiving events through a channel
//! - Automatic reconnection and resubscription
//!
//! # Running against a pyzmq publisher
//!
//! ```python
//! import time, zmq
//!
//! sock = zmq.Context().socket(zmq.PUB)
//! sock.bind("tcp://127.0.0.1:5556")
//! while True:
//!     sock.send_multipart([b"price", b"42"])
//!     time.sleep(1)
//! ```
//!
//! ```text
//! RUST_LOG=debug cargo run --example subscribe -- tcp://127.0.0.1:5556 price
//! ```

use tracing_subscriber::EnvFilter;
use zmtp_client::{Client, Event};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1);
    let address = args.next().unwrap_or_else(|| "tcp://127.0.0.1:5556".to_string());
    let topics: Vec<String> = args.collect();

    let client = Client::builder().build();
    let mut events = client.events();

    if topics.is_empty() {
        // The empty topic matches everything
        client.subscribe("");
    }
    for topic in topics {
        client.subscribe(topic);
    }
    client.open(&address)?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(Event::Connecting { address }) => println!("connecting to {}", address),
                Some(Event::Ready) => println!("ready, topics: {:?}", client.topics()),
                Some(Event::Message(message)) => println!("{}", message.to_strings_lossy().join(" | ")),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.close();
    Ok(())
}
