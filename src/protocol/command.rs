//! Command frames: name plus length-prefixed properties.
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────────────────────┐
//! │ name len │ name     │ property*                                   │
//! │ 1 byte   │ N bytes  │ nlen(1) name(nlen) vlen(4, BE) value(vlen)  │
//! └──────────┴──────────┴─────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use zmtp_client::protocol::{Command, CommandBuilder};
//!
//! let payload = CommandBuilder::new("READY")
//!     .property("Socket-Type", "SUB")
//!     .build()
//!     .unwrap();
//!
//! let command = Command::parse(&payload).unwrap();
//! assert_eq!(command.name, "READY");
//! assert_eq!(command.get("Socket-Type"), Some(&b"SUB"[..]));
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::build_frame;
use crate::error::{Result, ZmtpError};

/// READY command name.
pub const READY: &str = "READY";

/// ERROR command name.
pub const ERROR: &str = "ERROR";

/// Property carrying the sender's socket type.
pub const SOCKET_TYPE: &str = "Socket-Type";

/// Property under which an ERROR reason is exposed.
pub const REASON: &str = "Reason";

/// A decoded command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// Command name (e.g. `READY`).
    pub name: String,
    /// Properties in wire order. Names are unique; a repeated name
    /// overwrites the earlier value.
    pub properties: Vec<(String, Bytes)>,
}

impl Command {
    /// Create an empty command.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Insert a property, replacing any previous value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Bytes>) {
        let name = name.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.properties.push((name, value)),
        }
    }

    /// Look up a property value by name.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| &v[..])
    }

    /// Parse a command frame payload.
    ///
    /// `ERROR` bodies are accepted both in the ZMTP 3.0 reason form
    /// (1-byte length + text) and in the property form; the reason is
    /// exposed as the `Reason` property.
    ///
    /// # Errors
    ///
    /// Returns `MalformedCommand` if a length field runs past the payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            return Err(ZmtpError::MalformedCommand(
                "Expected size greater than 0".to_string(),
            ));
        }

        let name_len = payload[0] as usize;
        if payload.len() < name_len + 1 {
            return Err(ZmtpError::MalformedCommand(format!(
                "Expected size greater or equal than {}",
                name_len + 1
            )));
        }

        let mut command = Command::new(String::from_utf8_lossy(&payload[1..=name_len]));
        let body = &payload[name_len + 1..];

        if command.name == ERROR && is_reason_form(body) {
            command.insert(REASON, Bytes::copy_from_slice(&body[1..]));
            return Ok(command);
        }

        let mut cursor = body;
        while !cursor.is_empty() {
            let prop_name_len = cursor[0] as usize;
            let prop_name = cursor
                .get(1..1 + prop_name_len)
                .ok_or_else(invalid_size)?;
            let rest = &cursor[1 + prop_name_len..];

            let value_len = rest.get(..4).ok_or_else(invalid_size)?;
            let value_len =
                u32::from_be_bytes([value_len[0], value_len[1], value_len[2], value_len[3]])
                    as usize;
            let value = rest.get(4..4 + value_len).ok_or_else(invalid_size)?;

            command.insert(
                String::from_utf8_lossy(prop_name),
                Bytes::copy_from_slice(value),
            );
            cursor = &rest[4 + value_len..];
        }

        Ok(command)
    }

    /// Encode this command as a frame payload.
    pub fn encode(&self) -> Result<Bytes> {
        let mut builder = CommandBuilder::new(&self.name);
        for (name, value) in &self.properties {
            builder = builder.property(name, &value[..]);
        }
        builder.build()
    }
}

fn invalid_size() -> ZmtpError {
    ZmtpError::MalformedCommand("Invalid size".to_string())
}

fn is_reason_form(body: &[u8]) -> bool {
    !body.is_empty() && body[0] as usize == body.len() - 1
}

/// Typed builder for command payloads.
///
/// Appends the length-prefixed name and properties in call order.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    name: String,
    properties: Vec<(String, Bytes)>,
}

impl CommandBuilder {
    /// Start a command with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: Vec::new(),
        }
    }

    /// Append a property.
    pub fn property(mut self, name: &str, value: impl AsRef<[u8]>) -> Self {
        self.properties
            .push((name.to_string(), Bytes::copy_from_slice(value.as_ref())));
        self
    }

    /// Encode the command payload.
    ///
    /// # Errors
    ///
    /// Returns `MalformedCommand` if a name exceeds 255 bytes or a value
    /// exceeds 32 bits.
    pub fn build(self) -> Result<Bytes> {
        let capacity = 1
            + self.name.len()
            + self
                .properties
                .iter()
                .map(|(n, v)| 1 + n.len() + 4 + v.len())
                .sum::<usize>();
        let mut buf = BytesMut::with_capacity(capacity);

        put_short_string(&mut buf, &self.name)?;
        for (name, value) in &self.properties {
            put_short_string(&mut buf, name)?;
            let value_len = u32::try_from(value.len()).map_err(|_| {
                ZmtpError::MalformedCommand(format!("Property {} value too large", name))
            })?;
            buf.put_u32(value_len);
            buf.put_slice(value);
        }

        Ok(buf.freeze())
    }

    /// Encode the command as a complete command frame.
    pub fn build_frame(self) -> Result<Bytes> {
        let payload = self.build()?;
        Ok(build_frame(&payload, true, false))
    }
}

fn put_short_string(buf: &mut BytesMut, s: &str) -> Result<()> {
    let len = u8::try_from(s.len())
        .map_err(|_| ZmtpError::MalformedCommand(format!("Name {:?} exceeds 255 bytes", s)))?;
    buf.put_u8(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}
