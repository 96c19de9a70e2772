//! Multipart messages and their reassembly from data frames.

use bytes::Bytes;

/// One logical message: the ordered payloads of its frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    parts: Vec<Bytes>,
}

impl Message {
    /// Create a message from its parts.
    pub fn new(parts: Vec<Bytes>) -> Self {
        Self { parts }
    }

    /// Get the parts in wire order.
    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    /// Consume the message, returning its parts.
    pub fn into_parts(self) -> Vec<Bytes> {
        self.parts
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the message has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// First part, conventionally the topic for PUB/SUB.
    pub fn topic(&self) -> Option<&Bytes> {
        self.parts.first()
    }

    /// Decode every part as UTF-8, replacing invalid sequences.
    pub fn to_strings_lossy(&self) -> Vec<String> {
        self.parts
            .iter()
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect()
    }
}

impl From<Vec<Bytes>> for Message {
    fn from(parts: Vec<Bytes>) -> Self {
        Self::new(parts)
    }
}

/// Accumulates `more` frames until the final frame of a message arrives.
#[derive(Debug, Default)]
pub struct Reassembler {
    pending: Vec<Bytes>,
}

impl Reassembler {
    /// Create an empty reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one data frame payload.
    ///
    /// Returns the complete message when `more` is false.
    pub fn push(&mut self, chunk: Bytes, more: bool) -> Option<Message> {
        self.pending.push(chunk);
        if more {
            tracing::debug!("Message chunk: {} bytes", self.pending.last().map_or(0, Bytes::len));
            return None;
        }

        let message = Message::new(std::mem::take(&mut self.pending));
        tracing::debug!("Message: {} parts", message.len());
        Some(message)
    }

    /// Number of chunks waiting for the final frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_part_message() {
        let mut reassembler = Reassembler::new();

        assert!(reassembler.push(Bytes::from_static(b"A"), true).is_none());
        assert!(reassembler.push(Bytes::from_static(b"B"), true).is_none());
        assert_eq!(reassembler.pending_len(), 2);

        let message = reassembler.push(Bytes::from_static(b"C"), false).unwrap();
        assert_eq!(message.parts(), &[&b"A"[..], &b"B"[..], &b"C"[..]]);
        assert_eq!(reassembler.pending_len(), 0);
    }

    #[test]
    fn test_single_frame_message() {
        let mut reassembler = Reassembler::new();
        let message = reassembler.push(Bytes::from_static(b"only"), false).unwrap();

        assert_eq!(message.len(), 1);
        assert_eq!(message.topic().unwrap(), &b"only"[..]);
    }

    #[test]
    fn test_messages_do_not_bleed() {
        let mut reassembler = Reassembler::new();

        reassembler.push(Bytes::from_static(b"t1"), true);
        let first = reassembler.push(Bytes::from_static(b"p1"), false).unwrap();
        let second = reassembler.push(Bytes::from_static(b"p2"), false).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.parts(), &[&b"p2"[..]]);
    }


    #[test]
    fn test_to_strings_lossy() {
        let message = Message::new(vec![
            Bytes::from_static(b"price"),
            Bytes::from_static(&[0xFF, b'1']),
        ]);
        assert_eq!(message.to_strings_lossy(), vec!["price", "\u{FFFD}1"]);
    }
}
