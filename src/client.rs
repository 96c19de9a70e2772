//! Client builder and connection supervisor.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring handlers
//! and building the client. The [`Client`] manages the lifecycle:
//! 1. Connect to the publisher endpoint
//! 2. Run the handshake and send our READY
//! 3. Resend every subscription
//! 4. Read frames and dispatch messages to handlers
//! 5. On connection loss, wait and go back to 1
//!
//! # Example
//!
//! ```no_run
//! use zmtp_client::{Client, Event, EventKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .on(EventKind::Message, |event: &Event| {
//!             if let Event::Message(message) = event {
//!                 println!("{:?}", message.to_strings_lossy());
//!             }
//!             Ok(())
//!         })
//!         .build();
//!
//!     client.subscribe("price");
//!     client.open("tcp://127.0.0.1:5556")?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.close();
//!     Ok(())
//! }
//! ```

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::{Result, ZmtpError};
use crate::events::{dispatch_to, Event, EventHandlers, EventKind, HandlerResult};
use crate::session::{ConnectionState, Session, SessionEvent};
use crate::subscription::{subscribe_frame, unsubscribe_frame, SubscriptionSet};
use crate::transport::{BoxedStream, Connector, DefaultConnector, Endpoint};

/// Builder for configuring and creating a client.
pub struct ClientBuilder {
    config: ClientConfig,
    handlers: EventHandlers,
    connector: Arc<dyn Connector>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            handlers: EventHandlers::new(),
            connector: Arc::new(DefaultConnector),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the delay between a connection loss and the next attempt.
    ///
    /// Default: 5 seconds
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Give up after this many consecutive attempts that never reach READY.
    ///
    /// Default: 0 (retry forever)
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Tear the connection down if READY is not reached in time.
    ///
    /// Default: no timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the transport read buffer size.
    ///
    /// Default: 64 KiB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Use a custom transport.
    pub fn connector<C: Connector>(mut self, connector: C) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Register an event handler.
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.on(kind, handler);
        self
    }

    /// Build the client. Nothing is connected until [`Client::open`].
    pub fn build(self) -> Client {
        Client {
            shared: Arc::new(Shared {
                config: self.config,
                connector: self.connector,
                handlers: RwLock::new(self.handlers),
                inner: Mutex::new(Inner::default()),
            }),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscriber connection to one publisher.
///
/// Dropping the client closes it.
pub struct Client {
    shared: Arc<Shared>,
}

struct Shared {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    handlers: RwLock<EventHandlers>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    subscriptions: SubscriptionSet,
    address: Option<String>,
    generation: u64,
    running: Option<Running>,
}

/// Handle to the supervisor task of an open client.
struct Running {
    generation: u64,
    task: JoinHandle<()>,
    outbound: mpsc::UnboundedSender<Bytes>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Start connecting to a publisher.
    ///
    /// Returns immediately; progress is reported through events. The
    /// connection is retried until [`close`](Self::close) is called.
    ///
    /// # Errors
    ///
    /// - [`ZmtpError::AlreadyOpen`] if the client is already open
    /// - [`ZmtpError::InvalidEndpoint`] if `address` cannot be parsed
    /// - [`ZmtpError::Io`] if called outside a Tokio runtime
    pub fn open(&self, address: &str) -> Result<()> {
        let mut inner = self.shared.lock();
        if inner.running.is_some() {
            return Err(ZmtpError::AlreadyOpen);
        }

        let endpoint = Endpoint::parse(address)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ZmtpError::Io(io::Error::new(io::ErrorKind::Other, e)))?;

        inner.generation += 1;
        let generation = inner.generation;
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        // The task blocks on this lock until `running` is in place
        let task = runtime.spawn(supervise(
            self.shared.clone(),
            generation,
            endpoint.clone(),
            outbound_rx,
        ));

        inner.running = Some(Running {
            generation,
            task,
            outbound,
        });
        inner.address = Some(endpoint.to_string());
        inner.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Safe to call when already closed.
    pub fn close(&self) {
        let running = {
            let mut inner = self.shared.lock();
            inner.state = ConnectionState::Disconnected;
            inner.address = None;
            inner.running.take()
        };

        if let Some(running) = running {
            running.task.abort();
            tracing::info!("Connection closed");
        }
    }

    /// Add a topic subscription.
    ///
    /// Sent immediately when ready, and again after every reconnect.
    /// Returns `false` if the topic was already subscribed.
    pub fn subscribe(&self, topic: impl Into<Bytes>) -> bool {
        let topic = topic.into();
        let frame = subscribe_frame(&topic);

        let mut inner = self.shared.lock();
        if !inner.subscriptions.insert(topic) {
            return false;
        }
        inner.send_if_ready(frame);
        true
    }

    /// Remove a topic subscription.
    ///
    /// Returns `false` if the topic was not subscribed; nothing is sent then.
    pub fn unsubscribe(&self, topic: impl AsRef<[u8]>) -> bool {
        let topic = topic.as_ref();

        let mut inner = self.shared.lock();
        if !inner.subscriptions.remove(topic) {
            return false;
        }
        inner.send_if_ready(unsubscribe_frame(topic));
        true
    }

    /// Register an event handler.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.shared.write_handlers().on(kind, handler);
    }

    /// Receive every event through a channel.
    ///
    /// Each call creates an independent receiver. The channel is unbounded,
    /// so events queue up until read; dropping the receiver unregisters it.
    pub fn events(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.write_handlers().forward_to(tx);
        rx
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Check if the handshake has completed and messages flow.
    pub fn is_connected(&self) -> bool {
        self.state().is_ready()
    }

    /// Check if the client is open (connected or retrying).
    pub fn is_open(&self) -> bool {
        self.shared.lock().running.is_some()
    }

    /// Subscribed topics in subscription order.
    pub fn topics(&self) -> Vec<Bytes> {
        self.shared.lock().subscriptions.to_vec()
    }

    /// Endpoint of the open connection.
    pub fn address(&self) -> Option<String> {
        self.shared.lock().address.clone()
    }

    /// Get the configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

impl Inner {
    fn is_current(&self, generation: u64) -> bool {
        self.running.as_ref().map(|r| r.generation) == Some(generation)
    }

    fn send_if_ready(&self, frame: Bytes) {
        if !self.state.is_ready() {
            return;
        }
        if let Some(running) = &self.running {
            let _ = running.outbound.send(frame);
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_handlers(&self) -> std::sync::RwLockWriteGuard<'_, EventHandlers> {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update the state if `generation` is still the open connection.
    fn set_state(&self, generation: u64, state: ConnectionState) -> bool {
        let mut inner = self.lock();
        if !inner.is_current(generation) {
            return false;
        }
        inner.state = state;
        true
    }

    /// Mark the connection ready and snapshot the frames to resend.
    fn mark_ready(&self, generation: u64) -> Option<Vec<Bytes>> {
        let mut inner = self.lock();
        if !inner.is_current(generation) {
            return None;
        }
        inner.state = ConnectionState::Ready;
        Some(inner.subscriptions.resubscribe_frames())
    }

    /// Release the client after the supervisor gives up.
    fn finish(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.is_current(generation) {
            inner.running = None;
            inner.address = None;
            inner.state = ConnectionState::Disconnected;
        }
    }

    /// Dispatch an event unless the client was closed in the meantime.
    ///
    /// Handlers run without any lock held, so they may call back into the client.
    fn fire(&self, generation: u64, event: Event) -> bool {
        if !self.lock().is_current(generation) {
            return false;
        }
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers_for(event.kind());
        dispatch_to(&handlers, &event);

        if handlers.iter().any(|h| h.is_closed()) {
            let removed = self.write_handlers().prune();
            tracing::debug!("Removed {} closed event handlers", removed);
        }
        true
    }

    /// Drive one connection until it fails.
    ///
    /// Returns `Ok(())` only when the client was closed underneath it.
    async fn run_connection(
        &self,
        generation: u64,
        mut stream: BoxedStream,
        outbound_rx: &mut mpsc::UnboundedReceiver<Bytes>,
        reached_ready: &mut bool,
    ) -> Result<()> {
        // Frames queued for an earlier connection are covered by the resend
        while outbound_rx.try_recv().is_ok() {}

        let buffer_size = self.config.read_buffer_size.max(1);
        let mut session = Session::with_capacity(buffer_size);
        let mut buf = vec![0u8; buffer_size];
        let mut events = Vec::new();

        let mut state = session.state();
        if !self.set_state(generation, state) {
            return Ok(());
        }

        let deadline = self.config.handshake_timeout().map(|t| Instant::now() + t);

        loop {
            tokio::select! {
                read = stream.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Err(ZmtpError::ConnectionClosed);
                    }

                    let fed = session.feed(&buf[..n], &mut events);
                    if let Some(bytes) = session.take_outbound() {
                        stream.write_all(&bytes).await?;
                    }

                    for event in std::mem::take(&mut events) {
                        match event {
                            SessionEvent::Ready => {
                                let Some(frames) = self.mark_ready(generation) else {
                                    return Ok(());
                                };
                                *reached_ready = true;
                                for frame in &frames {
                                    stream.write_all(frame).await?;
                                }
                                tracing::info!("Ready, {} subscriptions sent", frames.len());
                                if !self.fire(generation, Event::Ready) {
                                    return Ok(());
                                }
                            }
                            SessionEvent::Message(message) => {
                                if !self.fire(generation, Event::Message(message)) {
                                    return Ok(());
                                }
                            }
                        }
                    }
                    fed?;

                    if !session.is_ready() && session.state() != state {
                        state = session.state();
                        if !self.set_state(generation, state) {
                            return Ok(());
                        }
                    }
                }
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(frame) => stream.write_all(&frame).await?,
                        None => return Ok(()),
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() && !session.is_ready() =>
                {
                    return Err(ZmtpError::HandshakeTimeout);
                }
            }
        }
    }
}

/// Supervisor task: connect, run, wait, repeat.
async fn supervise(
    shared: Arc<Shared>,
    generation: u64,
    endpoint: Endpoint,
    mut outbound_rx: mpsc::UnboundedReceiver<Bytes>,
) {
    let address = endpoint.to_string();
    let delay = shared.config.reconnect_delay();
    let mut failures = 0u32;

    tracing::info!("Connecting to {}", address);
    if !shared.fire(
        generation,
        Event::Connecting {
            address: address.clone(),
        },
    ) {
        return;
    }

    loop {
        if !shared.set_state(generation, ConnectionState::Connecting) {
            return;
        }

        let mut reached_ready = false;
        let outcome = match shared.connector.connect(&endpoint).await {
            Ok(stream) => {
                tracing::debug!("Transport open to {}", address);
                shared
                    .run_connection(generation, stream, &mut outbound_rx, &mut reached_ready)
                    .await
            }
            Err(e) => Err(ZmtpError::Io(e)),
        };

        let e = match outcome {
            Ok(()) => return,
            Err(e) => e,
        };

        if e.is_protocol_violation() {
            tracing::error!("Protocol violation from {}: {}", address, e);
        }

        if reached_ready {
            failures = 0;
            tracing::error!("Connection to {} lost: {}", address, e);
            if !shared.fire(
                generation,
                Event::Connecting {
                    address: address.clone(),
                },
            ) {
                return;
            }
        } else {
            failures += 1;
            tracing::warn!("Connection attempt to {} failed: {}", address, e);
        }

        if shared.config.attempts_exhausted(failures) {
            tracing::error!("Maximum reconnection attempts reached");
            shared.finish(generation);
            return;
        }

        if !shared.set_state(generation, ConnectionState::Disconnected) {
            return;
        }

        tracing::info!("Reconnecting in {:?}...", delay);
        tokio::time::sleep(delay).await;
    }
}
