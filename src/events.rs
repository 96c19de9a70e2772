//! Lifecycle and message events delivered to application code.
//!
//! Handlers are plain closures registered per [`EventKind`]. A handler that
//! returns an error or panics is logged and skipped; the remaining handlers
//! still run and the connection carries on.
//!
//! # Example
//!
//! ```
//! use zmtp_client::events::{Event, EventHandlers, EventKind};
//!
//! let mut handlers = EventHandlers::new();
//! handlers.on(EventKind::Ready, |_event: &Event| {
//!     println!("ready");
//!     Ok(())
//! });
//!
//! assert_eq!(handlers.dispatch(&Event::Ready), 0);
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::message::Message;

/// An event emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A connection attempt is starting (first open or retry cycle).
    Connecting {
        /// Endpoint being connected to.
        address: String,
    },
    /// Handshake completed; subscriptions have been sent.
    Ready,
    /// A complete multipart message.
    Message(Message),
}

impl Event {
    /// Get the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connecting { .. } => EventKind::Connecting,
            Event::Ready => EventKind::Ready,
            Event::Message(_) => EventKind::Message,
        }
    }
}

/// Event discriminant used for handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::Connecting`]
    Connecting,
    /// [`Event::Ready`]
    Ready,
    /// [`Event::Message`]
    Message,
}

impl EventKind {
    /// All event kinds.
    pub const ALL: [EventKind; 3] = [EventKind::Connecting, EventKind::Ready, EventKind::Message];
}

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for handler functions.
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Trait for event handlers.
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event.
    fn call(&self, event: &Event) -> HandlerResult;

    /// Whether this handler can never receive again and may be removed.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> EventHandler for F
where
    F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, event: &Event) -> HandlerResult {
        self(event)
    }
}

/// Forwards events into a channel until its receiver is dropped.
///
/// The channel is unbounded: a receiver that is kept alive but never read
/// buffers every event.
struct Forwarder {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler for Forwarder {
    fn call(&self, event: &Event) -> HandlerResult {
        // Send only fails once the receiver is gone; `prune` then removes us
        let _ = self.tx.send(event.clone());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Registry of event handlers.
#[derive(Clone, Default)]
pub struct EventHandlers {
    handlers: Vec<(EventKind, Arc<dyn EventHandler>)>,
}

impl EventHandlers {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one kind of event.
    ///
    /// Handlers run in registration order.
    pub fn on<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.push((kind, Arc::new(handler)));
    }

    /// Register a handler that forwards every event into a channel.
    ///
    /// The handler is removed by [`prune`](Self::prune) once the receiver
    /// has been dropped.
    pub fn forward_to(&mut self, tx: mpsc::UnboundedSender<Event>) {
        self.prune();
        let handler: Arc<dyn EventHandler> = Arc::new(Forwarder { tx });
        for kind in EventKind::ALL {
            self.handlers.push((kind, handler.clone()));
        }
    }

    /// Remove handlers that can no longer receive events.
    ///
    /// Returns the number of registrations removed.
    pub fn prune(&mut self) -> usize {
        let before = self.handlers.len();
        self.handlers.retain(|(_, h)| !h.is_closed());
        before - self.handlers.len()
    }

    /// Number of registered handlers for a kind.
    pub fn count(&self, kind: EventKind) -> usize {
        self.handlers.iter().filter(|(k, _)| *k == kind).count()
    }

    /// Handlers registered for a kind, in registration order.
    pub fn handlers_for(&self, kind: EventKind) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, h)| h.clone())
            .collect()
    }

    /// Dispatch an event to every matching handler.
    ///
    /// Returns the number of handlers that failed.
    pub fn dispatch(&self, event: &Event) -> usize {
        dispatch_to(&self.handlers_for(event.kind()), event)
    }
}

/// Call each handler with `event`, isolating failures.
///
/// Returns the number of handlers that returned an error or panicked.
pub fn dispatch_to(handlers: &[Arc<dyn EventHandler>], event: &Event) -> usize {
    let mut failures = 0;
    for handler in handlers {
        let outcome = catch_unwind(AssertUnwindSafe(|| handler.call(event)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failures += 1;
                tracing::error!("Exception raised from {:?} event handler: {}", event.kind(), e);
            }
            Err(_) => {
                failures += 1;
                tracing::error!("Panic raised from {:?} event handler", event.kind());
            }
        }
    }
    failures
}
