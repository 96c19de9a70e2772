//! Protocol module - wire format, framing, and command types.
//!
//! This module implements the byte-level side of ZMTP 3.0:
//! - Fixed-size greeting, version and security blocks
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors
//! - Command parsing and building

mod command;
mod frame;
mod frame_buffer;
mod wire_format;

pub use command::{Command, CommandBuilder, ERROR, READY, REASON, SOCKET_TYPE};
pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    check_security, check_signature, check_version, decode_long_size, encode_frame_header,
    flags, greeting_reply, security_reply, size_field_len, AS_SERVER_OFFSET, LONG_SIZE_LEN,
    MAX_FRAME_SIZE, MECHANISM_SIZE, NULL_MECHANISM, SECURITY_SIZE, SHORT_SIZE_LEN, SIGNATURE,
    SIGNATURE_SIZE, VERSION_MAJOR, VERSION_MINOR, VERSION_SIZE,
};
