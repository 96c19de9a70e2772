//! Handshake sequencer for the fixed-size greeting blocks.
//!
//! Runs once per connection, strictly in order:
//! 1. Signature: read 10 bytes, reply with our signature and version
//! 2. Version: read 2 bytes, require major version 3
//! 3. Security: read 52 bytes, require NULL with as-server unset, reply
//!    with the NULL security block
//!
//! The capability (READY) exchange that follows is frame-based and is
//! driven by [`Session`](crate::session::Session).

use bytes::{BufMut, BytesMut};

use crate::error::Result;
use crate::protocol::{
    check_security, check_signature, check_version, greeting_reply, security_reply,
    FrameBuffer, SECURITY_SIZE, SIGNATURE_SIZE, VERSION_SIZE,
};

/// Current handshake stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    /// Waiting for the peer's 10-byte signature.
    Signature,
    /// Waiting for the peer's 2-byte version.
    Version,
    /// Waiting for the peer's 52-byte security block.
    Security,
    /// All fixed-size blocks exchanged.
    Done,
}

impl HandshakeStage {
    /// Bytes that must be buffered before this stage can run.
    pub fn needed(self) -> usize {
        match self {
            HandshakeStage::Signature => SIGNATURE_SIZE,
            HandshakeStage::Version => VERSION_SIZE,
            HandshakeStage::Security => SECURITY_SIZE,
            HandshakeStage::Done => 0,
        }
    }
}

/// Resumable handshake state.
#[derive(Debug)]
pub struct Handshake {
    stage: HandshakeStage,
}

impl Handshake {
    /// Start a handshake at the signature stage.
    pub fn new() -> Self {
        Self {
            stage: HandshakeStage::Signature,
        }
    }

    /// Get the current stage.
    pub fn stage(&self) -> HandshakeStage {
        self.stage
    }

    /// Check if all fixed-size blocks have been exchanged.
    pub fn is_done(&self) -> bool {
        self.stage == HandshakeStage::Done
    }

    /// Run as many stages as the buffered input allows.
    ///
    /// Replies are appended to `out`. Returns `Ok(true)` once the
    /// security stage has completed.
    ///
    /// # Errors
    ///
    /// Returns the protocol violation of the first stage that fails. No
    /// reply is written for a failed stage.
    pub fn advance(&mut self, input: &mut FrameBuffer, out: &mut BytesMut) -> Result<bool> {
        while !self.is_done() {
            let Some(block) = input.take_exact(self.stage.needed()) else {
                return Ok(false);
            };

            self.stage = match self.stage {
                HandshakeStage::Signature => {
                    check_signature(&block)?;
                    out.put_slice(&greeting_reply());
                    HandshakeStage::Version
                }
                HandshakeStage::Version => {
                    check_version(&block)?;
                    HandshakeStage::Security
                }
                HandshakeStage::Security => {
                    check_security(&block)?;
                    out.put_slice(&security_reply());
                    HandshakeStage::Done
                }
                HandshakeStage::Done => HandshakeStage::Done,
            };
            tracing::debug!("Handshake stage: {:?}", self.stage);
        }

        Ok(true)
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZmtpError;
    use crate::protocol::SIGNATURE;

    fn null_security() -> [u8; SECURITY_SIZE] {
        let mut block = [0u8; SECURITY_SIZE];
        block[..4].copy_from_slice(b"NULL");
        block
    }

    #[test]
    fn test_full_handshake_in_one_push() {
        let mut input = FrameBuffer::new();
        input.extend(&SIGNATURE);
        input.extend(&[3, 0]);
        input.extend(&null_security());

        let mut out = BytesMut::new();
        let mut handshake = Handshake::new();

        assert!(handshake.advance(&mut input, &mut out).unwrap());
        assert!(handshake.is_done());
        assert!(input.is_empty());

        assert_eq!(out.len(), 12 + 52);
        assert_eq!(&out[..12], &greeting_reply());
        assert_eq!(&out[12..16], b"NULL");
    }

    #[test]
    fn test_handshake_suspends_between_blocks() {
        let mut input = FrameBuffer::new();
        let mut out = BytesMut::new();
        let mut handshake = Handshake::new();

        input.extend(&SIGNATURE[..6]);
        assert!(!handshake.advance(&mut input, &mut out).unwrap());
        assert_eq!(handshake.stage(), HandshakeStage::Signature);
        assert!(out.is_empty());

        input.extend(&SIGNATURE[6..]);
        input.extend(&[3]);
        assert!(!handshake.advance(&mut input, &mut out).unwrap());
        assert_eq!(handshake.stage(), HandshakeStage::Version);
        assert_eq!(out.len(), 12);
        assert_eq!(input.len(), 1);

        input.extend(&[1]);
        assert!(!handshake.advance(&mut input, &mut out).unwrap());
        assert_eq!(handshake.stage(), HandshakeStage::Security);

        input.extend(&null_security());
        assert!(handshake.advance(&mut input, &mut out).unwrap());
    }

    #[test]
    fn test_bad_signature_sends_nothing() {
        for (index, value) in [(0usize, 0x00u8), (0, 0xFE), (9, 0x00), (9, 0xFF)] {
            let mut signature = SIGNATURE;
            signature[index] = value;

            let mut input = FrameBuffer::new();
            input.extend(&signature);
            let mut out = BytesMut::new();

            let result = Handshake::new().advance(&mut input, &mut out);
            assert!(matches!(result, Err(ZmtpError::InvalidGreeting(_))));
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_unsupported_version() {
        let mut input = FrameBuffer::new();
        input.extend(&SIGNATURE);
        input.extend(&[2, 0]);
        let mut out = BytesMut::new();

        let err = Handshake::new().advance(&mut input, &mut out).unwrap_err();
        assert!(matches!(err, ZmtpError::UnsupportedVersion { major: 2, .. }));
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_as_server_rejected_without_reply() {
        let mut security = null_security();
        security[20] = 1;

        let mut input = FrameBuffer::new();
        input.extend(&SIGNATURE);
        input.extend(&[3, 0]);
        input.extend(&security);
        let mut out = BytesMut::new();

        let err = Handshake::new().advance(&mut input, &mut out).unwrap_err();
        assert!(matches!(err, ZmtpError::UnexpectedServerRole(1)));
        // Only the greeting reply went out
        assert_eq!(out.len(), 12);
    }
}
