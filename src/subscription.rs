//! Topic subscriptions and their control frames.
//!
//! A subscription is sent to the publisher as an ordinary data frame whose
//! payload is `0x01` followed by the topic; an unsubscription uses `0x00`.
//! The publisher forgets subscriptions when the connection drops, so the
//! full set is resent every time a connection becomes ready.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::build_frame;

/// Payload prefix for a subscription.
pub const SUBSCRIBE_PREFIX: u8 = 0x01;

/// Payload prefix for an unsubscription.
pub const UNSUBSCRIBE_PREFIX: u8 = 0x00;

/// Set of topics the caller is interested in.
///
/// Iteration follows insertion order, which is also the resend order.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSet {
    topics: Vec<Bytes>,
}

impl SubscriptionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic. Returns `false` if it was already present.
    pub fn insert(&mut self, topic: Bytes) -> bool {
        if self.contains(&topic) {
            return false;
        }
        self.topics.push(topic);
        true
    }

    /// Remove a topic. Returns `false` if it was not present.
    pub fn remove(&mut self, topic: &[u8]) -> bool {
        match self.topics.iter().position(|t| t == topic) {
            Some(index) => {
                self.topics.remove(index);
                true
            }
            None => false,
        }
    }

    /// Check if a topic is present.
    pub fn contains(&self, topic: &[u8]) -> bool {
        self.topics.iter().any(|t| t == topic)
    }

    /// Iterate topics in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.topics.iter()
    }

    /// Snapshot of all topics.
    pub fn to_vec(&self) -> Vec<Bytes> {
        self.topics.clone()
    }

    /// Number of topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Subscribe frames for every topic, in insertion order.
    pub fn resubscribe_frames(&self) -> Vec<Bytes> {
        self.topics.iter().map(|t| subscribe_frame(t)).collect()
    }
}

/// Build the frame that subscribes to `topic`.
pub fn subscribe_frame(topic: &[u8]) -> Bytes {
    control_frame(SUBSCRIBE_PREFIX, topic)
}

/// Build the frame that cancels a subscription to `topic`.
pub fn unsubscribe_frame(topic: &[u8]) -> Bytes {
    control_frame(UNSUBSCRIBE_PREFIX, topic)
}

fn control_frame(prefix: u8, topic: &[u8]) -> Bytes {
    let mut payload = BytesMut::with_capacity(1 + topic.len());
    payload.put_u8(prefix);
    payload.put_slice(topic);
    build_frame(&payload, false, false)
}
