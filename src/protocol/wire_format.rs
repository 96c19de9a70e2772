//! Wire format encoding and decoding.
//!
//! Fixed-size handshake blocks, in the order they are exchanged:
//! ```text
//! ┌───────────┬─────────┬──────────────────────────────────────┐
//! │ Signature │ Version │ Security block                       │
//! │ 10 bytes  │ 2 bytes │ 52 bytes                             │
//! │ FF ..  7F │ 03 00   │ mechanism(20) as-server(1) filler(31)│
//! └───────────┴─────────┴──────────────────────────────────────┘
//! ```
//!
//! Every frame after the handshake starts with a flag byte followed by a
//! 1-byte size, or an 8-byte big endian size when the long flag is set.

use crate::error::{Result, ZmtpError};

/// Signature size in bytes.
pub const SIGNATURE_SIZE: usize = 10;

/// Canonical signature sent to the peer (filler bytes zeroed).
pub const SIGNATURE: [u8; SIGNATURE_SIZE] = [0xFF, 0, 0, 0, 0, 0, 0, 0, 0, 0x7F];

/// Version block size in bytes.
pub const VERSION_SIZE: usize = 2;

/// Protocol major version spoken by this client.
pub const VERSION_MAJOR: u8 = 3;

/// Protocol minor version announced by this client.
pub const VERSION_MINOR: u8 = 0;

/// Security block size in bytes (mechanism + as-server + filler).
pub const SECURITY_SIZE: usize = 52;

/// Width of the null-padded mechanism name field.
pub const MECHANISM_SIZE: usize = 20;

/// Offset of the as-server flag inside the security block.
pub const AS_SERVER_OFFSET: usize = MECHANISM_SIZE;

/// The only supported security mechanism.
pub const NULL_MECHANISM: &[u8] = b"NULL";

/// Size of the short frame size field.
pub const SHORT_SIZE_LEN: usize = 1;

/// Size of the long frame size field.
pub const LONG_SIZE_LEN: usize = 8;

/// Largest frame payload this client accepts or produces.
pub const MAX_FRAME_SIZE: u64 = u32::MAX as u64;

/// Frame flag bits.
pub mod flags {
    /// More frames of the same message follow.
    pub const MORE: u8 = 0b0000_0001;
    /// Size field is 8 bytes instead of 1.
    pub const LONG: u8 = 0b0000_0010;
    /// Frame carries a command, not application data.
    pub const COMMAND: u8 = 0b0000_0100;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Validate the peer signature.
///
/// Only the first and last bytes are significant; the filler is ignored.
///
/// # Panics
///
/// Panics if `buf` is shorter than `SIGNATURE_SIZE`.
pub fn check_signature(buf: &[u8]) -> Result<()> {
    let mut signature = [0u8; SIGNATURE_SIZE];
    signature.copy_from_slice(&buf[..SIGNATURE_SIZE]);
    if signature[0] != 0xFF || signature[SIGNATURE_SIZE - 1] != 0x7F {
        return Err(ZmtpError::InvalidGreeting(signature));
    }
    Ok(())
}

/// Signature followed by this client's version, sent once the peer
/// signature has been accepted.
pub fn greeting_reply() -> [u8; SIGNATURE_SIZE + VERSION_SIZE] {
    let mut buf = [0u8; SIGNATURE_SIZE + VERSION_SIZE];
    buf[..SIGNATURE_SIZE].copy_from_slice(&SIGNATURE);
    buf[SIGNATURE_SIZE] = VERSION_MAJOR;
    buf[SIGNATURE_SIZE + 1] = VERSION_MINOR;
    buf
}

/// Validate the peer version block. The minor version is ignored.
///
/// # Panics
///
/// Panics if `buf` is shorter than `VERSION_SIZE`.
pub fn check_version(buf: &[u8]) -> Result<()> {
    let (major, minor) = (buf[0], buf[1]);
    if major != VERSION_MAJOR {
        return Err(ZmtpError::UnsupportedVersion { major, minor });
    }
    Ok(())
}

/// Validate the peer security block: NULL mechanism, as-server unset.
///
/// # Panics
///
/// Panics if `buf` is shorter than `AS_SERVER_OFFSET + 1`.
pub fn check_security(buf: &[u8]) -> Result<()> {
    let mechanism = &buf[..MECHANISM_SIZE];
    let expected_len = NULL_MECHANISM.len();
    if &mechanism[..expected_len] != NULL_MECHANISM || mechanism[expected_len] != 0 {
        let name_end = mechanism
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MECHANISM_SIZE);
        return Err(ZmtpError::UnsupportedMechanism(
            String::from_utf8_lossy(&mechanism[..name_end]).into_owned(),
        ));
    }

    let as_server = buf[AS_SERVER_OFFSET];
    if as_server != 0 {
        return Err(ZmtpError::UnexpectedServerRole(as_server));
    }

    Ok(())
}

/// Security block sent back to the peer: "NULL" then 48 zero bytes.
///
/// The zero run covers the mechanism padding, a cleared as-server flag
/// and the filler.
pub fn security_reply() -> [u8; SECURITY_SIZE] {
    let mut buf = [0u8; SECURITY_SIZE];
    buf[..NULL_MECHANISM.len()].copy_from_slice(NULL_MECHANISM);
    buf
}

/// Width of the size field selected by a flag byte.
#[inline]
pub fn size_field_len(frame_flags: u8) -> usize {
    if flags::has_flag(frame_flags, flags::LONG) {
        LONG_SIZE_LEN
    } else {
        SHORT_SIZE_LEN
    }
}

/// Decode an 8-byte size field.
///
/// The high 4 bytes come first on the wire and must be zero.
pub fn decode_long_size(buf: &[u8]) -> Result<u32> {
    let mut field = [0u8; LONG_SIZE_LEN];
    field.copy_from_slice(&buf[..LONG_SIZE_LEN]);
    let size = u64::from_be_bytes(field);
    if size > MAX_FRAME_SIZE {
        return Err(ZmtpError::OversizedMessage(size));
    }
    Ok(size as u32)
}

/// Encode a frame header (flag byte + size field) for a payload length.
///
/// Lengths above 255 switch to the long size form. Returns the header
/// buffer and the number of bytes used.
pub fn encode_frame_header(payload_len: usize, command: bool, more: bool) -> ([u8; 9], usize) {
    let mut buf = [0u8; 1 + LONG_SIZE_LEN];
    let mut frame_flags = 0u8;
    if command {
        frame_flags |= flags::COMMAND;
    }
    if more {
        frame_flags |= flags::MORE;
    }

    let used = if payload_len > u8::MAX as usize {
        frame_flags |= flags::LONG;
        buf[1..].copy_from_slice(&(payload_len as u64).to_be_bytes());
        1 + LONG_SIZE_LEN
    } else {
        buf[1] = payload_len as u8;
        1 + SHORT_SIZE_LEN
    };
    buf[0] = frame_flags;

    (buf, used)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic]
    fn test_check_version_short_buffer_panics() {
        let _ = check_version(&[VERSION_MAJOR]);
    }

    #[test]
    #[should_panic]
    fn test_check_security_short_buffer_panics() {
        let _ = check_security(b"NULL\0");
    }

    #[test]
    fn test_signature_accepts_any_filler() {
        let mut sig = [0xAAu8; SIGNATURE_SIZE];
        sig[0] = 0xFF;
        sig[9] = 0x7F;
        assert!(check_signature(&sig).is_ok());
    }

    #[test]
    fn test_signature_rejects_bad_bounds() {
        let mut sig = SIGNATURE;
        sig[0] = 0xFE;
        assert!(matches!(
            check_signature(&sig),
            Err(ZmtpError::InvalidGreeting(_))
        ));

        let mut sig = SIGNATURE;
        sig[9] = 0x00;
        assert!(matches!(
            check_signature(&sig),
            Err(ZmtpError::InvalidGreeting(_))
        ));
    }

    #[test]
    fn test_greeting_reply_layout() {
        let reply = greeting_reply();
        assert_eq!(&reply[..10], &[0xFF, 0, 0, 0, 0, 0, 0, 0, 0, 0x7F]);
        assert_eq!(&reply[10..], &[3, 0]);
    }

    #[test]
    fn test_version_minor_ignored() {
        assert!(check_version(&[3, 0]).is_ok());
        assert!(check_version(&[3, 1]).is_ok());
        assert!(matches!(
            check_version(&[2, 0]),
            Err(ZmtpError::UnsupportedVersion { major: 2, minor: 0 })
        ));
    }

    #[test]
    fn test_security_null_mechanism() {
        let mut block = [0u8; SECURITY_SIZE];
        block[..4].copy_from_slice(b"NULL");
        assert!(check_security(&block).is_ok());
    }

    #[test]
    fn test_security_rejects_other_mechanism() {
        let mut block = [0u8; SECURITY_SIZE];
        block[..5].copy_from_slice(b"PLAIN");
        let err = check_security(&block).unwrap_err();
        assert!(matches!(err, ZmtpError::UnsupportedMechanism(ref m) if m == "PLAIN"));

        // "NULLX" shares the prefix but is not NULL
        let mut block = [0u8; SECURITY_SIZE];
        block[..5].copy_from_slice(b"NULLX");
        assert!(matches!(
            check_security(&block),
            Err(ZmtpError::UnsupportedMechanism(_))
        ));
    }

    #[test]
    fn test_security_rejects_as_server() {
        let mut block = [0u8; SECURITY_SIZE];
        block[..4].copy_from_slice(b"NULL");
        block[AS_SERVER_OFFSET] = 1;
        assert!(matches!(
            check_security(&block),
            Err(ZmtpError::UnexpectedServerRole(1))
        ));
    }

    #[test]
    fn test_security_reply_layout() {
        let reply = security_reply();
        assert_eq!(reply.len(), 52);
        assert_eq!(&reply[..4], b"NULL");
        assert!(reply[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_long_size_high_half_must_be_zero() {
        assert_eq!(decode_long_size(&[0, 0, 0, 0, 0, 0, 1, 0]).unwrap(), 256);
        assert_eq!(
            decode_long_size(&[0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(),
            u32::MAX
        );
        assert!(matches!(
            decode_long_size(&[0, 0, 0, 1, 0, 0, 0, 0]),
            Err(ZmtpError::OversizedMessage(n)) if n == 1 << 32
        ));
    }

    #[test]
    fn test_frame_header_short_and_long() {
        let (buf, used) = encode_frame_header(5, false, false);
        assert_eq!(&buf[..used], &[0x00, 5]);

        let (buf, used) = encode_frame_header(255, true, false);
        assert_eq!(&buf[..used], &[flags::COMMAND, 255]);

        let (buf, used) = encode_frame_header(256, false, true);
        assert_eq!(
            &buf[..used],
            &[flags::LONG | flags::MORE, 0, 0, 0, 0, 0, 0, 1, 0]
        );
    }

    #[test]
    fn test_size_field_len() {
        assert_eq!(size_field_len(0), 1);
        assert_eq!(size_field_len(flags::COMMAND | flags::MORE), 1);
        assert_eq!(size_field_len(flags::LONG), 8);
    }
}
