//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForFlags`: Need 1 flag byte
//! - `WaitingForSize`: Flags parsed, need 1 or 8 size bytes
//! - `WaitingForPayload`: Size parsed, need N payload bytes
//!
//! Each step only consumes bytes once the whole field is buffered, so a
//! partially received field is never split across two reads.
//!
//! # Example
//!
//! ```
//! use zmtp_client::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Flag byte and size arrive first, payload later
//! assert!(buffer.push(&[0x00, 0x02]).unwrap().is_empty());
//! let frames = buffer.push(b"hi").unwrap();
//!
//! assert_eq!(frames[0].payload(), b"hi");
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{decode_long_size, flags, size_field_len};
use super::Frame;
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the flag byte.
    WaitingForFlags,
    /// Flag byte consumed, waiting for the size field.
    WaitingForSize { flags: u8 },
    /// Size consumed, waiting for payload bytes.
    WaitingForPayload { flags: u8, size: u32 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// The same buffer also serves the fixed-size handshake reads through
/// [`FrameBuffer::take_exact`], so bytes that arrive together with the last
/// handshake block are not lost when frame decoding starts.
pub struct FrameBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default 64KB capacity.
    pub fn new() -> Self {
        Self::with_capacity(64 * 1024)
    }

    /// Create a new frame buffer with custom initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::WaitingForFlags,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Partial data is buffered internally for the next push.
    ///
    /// # Errors
    ///
    /// Returns `OversizedMessage` if a long size field exceeds 32 bits.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` if a complete frame was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a protocol violation
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                State::WaitingForFlags => {
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    let frame_flags = self.buffer.split_to(1)[0];
                    self.state = State::WaitingForSize { flags: frame_flags };
                }

                State::WaitingForSize { flags: frame_flags } => {
                    let field_len = size_field_len(frame_flags);
                    if self.buffer.len() < field_len {
                        return Ok(None);
                    }

                    let field = self.buffer.split_to(field_len);
                    let size = if flags::has_flag(frame_flags, flags::LONG) {
                        decode_long_size(&field)?
                    } else {
                        u32::from(field[0])
                    };

                    tracing::debug!("Packet size: {}", size);
                    self.state = State::WaitingForPayload {
                        flags: frame_flags,
                        size,
                    };
                }

                State::WaitingForPayload {
                    flags: frame_flags,
                    size,
                } => {
                    let size = size as usize;
                    if self.buffer.len() < size {
                        return Ok(None);
                    }

                    let payload = self.buffer.split_to(size).freeze();
                    self.state = State::WaitingForFlags;

                    return Ok(Some(Frame::new(frame_flags, payload)));
                }
            }
        }
    }

    /// Take exactly `n` bytes if that many are buffered.
    ///
    /// Used for the fixed-size handshake blocks. Returns `None` and consumes
    /// nothing when fewer than `n` bytes are available.
    pub fn take_exact(&mut self, n: usize) -> Option<Bytes> {
        if self.buffer.len() < n {
            return None;
        }
        Some(self.buffer.split_to(n).freeze())
    }

    /// Append data to the buffer without extracting frames.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForFlags => "WaitingForFlags",
            State::WaitingForSize { .. } => "WaitingForSize",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZmtpError;
    use crate::protocol::build_frame;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&build_frame(b"hello", false, false)).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"hello");
        assert!(!frames[0].has_more());
        assert!(!frames[0].is_command());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = Vec::new();
        combined.extend_from_slice(&build_frame(b"first", false, true));
        combined.extend_from_slice(&build_frame(b"second", false, true));
        combined.extend_from_slice(&build_frame(b"third", false, false));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].payload(), b"first");
        assert_eq!(frames[1].payload(), b"second");
        assert_eq!(frames[2].payload(), b"third");
        assert!(frames[0].has_more());
        assert!(!frames[2].has_more());
    }

    #[test]
    fn test_fragmented_long_size() {
        let mut buffer = FrameBuffer::new();
        let payload = vec![7u8; 400];
        let frame_bytes = build_frame(&payload, false, false);

        // Flag byte plus half of the 8-byte size field
        assert!(buffer.push(&frame_bytes[..5]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForSize");
        // The partial size field stays buffered untouched
        assert_eq!(buffer.len(), 4);

        assert!(buffer.push(&frame_bytes[5..9]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = buffer.push(&frame_bytes[9..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), &payload[..]);
        assert!(frames[0].is_long_size());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = b"this is a longer payload that will be fragmented";
        let frame_bytes = build_frame(payload, false, false);

        let frames = buffer.push(&frame_bytes[..12]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        let frames = buffer.push(&frame_bytes[12..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), payload);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&[0x00, 0x00]).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload.is_empty());
        assert_eq!(buffer.state_name(), "WaitingForFlags");
    }

    #[test]
    fn test_oversized_long_size_rejected() {
        let mut buffer = FrameBuffer::new();
        let bytes = [flags::LONG, 0, 0, 0, 1, 0, 0, 0, 0];

        let result = buffer.push(&bytes);
        assert!(matches!(result, Err(ZmtpError::OversizedMessage(_))));
    }

    #[test]
    fn test_command_frame_flags() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&build_frame(b"\x05READY", true, false)).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_command());
    }

    #[test]
    fn test_take_exact_then_frames() {
        let mut buffer = FrameBuffer::new();
        let mut data = vec![3u8, 0];
        data.extend_from_slice(&build_frame(b"after", false, false));
        buffer.extend(&data);

        assert!(buffer.take_exact(100).is_none());
        assert_eq!(buffer.len(), data.len());

        assert_eq!(&buffer.take_exact(2).unwrap()[..], &[3, 0]);
        let frame = buffer.next_frame().unwrap().unwrap();
        assert_eq!(frame.payload(), b"after");
    }


    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let mut frame_bytes = build_frame(b"hi", false, true).to_vec();
        frame_bytes.extend_from_slice(&build_frame(b"there", false, false));

        let mut all_frames = Vec::new();
        for byte in &frame_bytes {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 2);
        assert_eq!(all_frames[0].payload(), b"hi");
        assert_eq!(all_frames[1].payload(), b"there");
    }
}
