//! Frame struct with typed accessors.
//!
//! Represents one decoded wire frame: the flag byte and its payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use zmtp_client::protocol::{flags, Frame};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(flags::MORE, Bytes::from_static(b"hello"));
//!
//! assert!(frame.has_more());
//! assert!(!frame.is_command());
//! assert_eq!(frame.payload(), b"hello");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{encode_frame_header, flags, LONG_SIZE_LEN};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw flag byte (see `flags` module).
    pub flags: u8,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from a flag byte and payload.
    pub fn new(flags: u8, payload: Bytes) -> Self {
        Self { flags, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length as carried by the size field.
    #[inline]
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Check if this frame carries a command.
    #[inline]
    pub fn is_command(&self) -> bool {
        flags::has_flag(self.flags, flags::COMMAND)
    }

    /// Check if the size was sent in the 8-byte form.
    #[inline]
    pub fn is_long_size(&self) -> bool {
        flags::has_flag(self.flags, flags::LONG)
    }

    /// Check if more frames of the same message follow.
    #[inline]
    pub fn has_more(&self) -> bool {
        flags::has_flag(self.flags, flags::MORE)
    }
}

/// Build a complete outbound frame as a single buffer.
///
/// Payloads longer than 255 bytes get the long size form automatically.
///
/// # Example
///
/// ```
/// use zmtp_client::protocol::build_frame;
///
/// let bytes = build_frame(b"\x01price", false, false);
/// assert_eq!(&bytes[..], b"\x00\x06\x01price");
/// ```
pub fn build_frame(payload: &[u8], command: bool, more: bool) -> Bytes {
    let (header, used) = encode_frame_header(payload.len(), command, more);
    let mut buf = BytesMut::with_capacity(1 + LONG_SIZE_LEN + payload.len());
    buf.put_slice(&header[..used]);
    buf.put_slice(payload);
    buf.freeze()
}
