//! Client configuration.
//!
//! Loadable from JSON; every field is optional in the input.
//!
//! ```
//! use std::time::Duration;
//! use zmtp_client::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{ "reconnect_delay_ms": 250 }"#).unwrap();
//! assert_eq!(config.reconnect_delay(), Duration::from_millis(250));
//! assert_eq!(config.handshake_timeout(), None);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default delay between a connection loss and the next attempt.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;

/// Default read buffer size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Connection supervisor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Delay before reconnecting, in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// Maximum consecutive failed attempts (0 = infinite)
    #[serde(default)]
    pub max_reconnect_attempts: u32,

    /// Time allowed from transport open to peer READY, in milliseconds (0 = no limit)
    #[serde(default)]
    pub handshake_timeout_ms: u64,

    /// Size of the transport read buffer
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

fn default_reconnect_delay() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay(),
            max_reconnect_attempts: 0,
            handshake_timeout_ms: 0,
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl ClientConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reconnect delay as a duration.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Handshake timeout, if one is configured.
    pub fn handshake_timeout(&self) -> Option<Duration> {
        (self.handshake_timeout_ms > 0).then(|| Duration::from_millis(self.handshake_timeout_ms))
    }

    /// Check whether `failures` consecutive failed attempts exhaust the budget.
    pub fn attempts_exhausted(&self, failures: u32) -> bool {
        self.max_reconnect_attempts > 0 && failures >= self.max_reconnect_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZmtpError;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.reconnect_delay(), Duration::from_millis(5000));
        assert_eq!(config.max_reconnect_attempts, 0);
        assert_eq!(config.handshake_timeout(), None);
        assert_eq!(config.read_buffer_size, 64 * 1024);
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        assert_eq!(ClientConfig::from_json("{}").unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_full_json() {
        let config = ClientConfig::from_json(
            r#"{
                "reconnect_delay_ms": 100,
                "max_reconnect_attempts": 3,
                "handshake_timeout_ms": 2000,
                "read_buffer_size": 4096
            }"#,
        )
        .unwrap();

        assert_eq!(config.reconnect_delay(), Duration::from_millis(100));
        assert_eq!(config.handshake_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.read_buffer_size, 4096);
        assert!(!config.attempts_exhausted(2));
        assert!(config.attempts_exhausted(3));
    }

    #[test]
    fn test_unbounded_attempts() {
        let config = ClientConfig::default();
        assert!(!config.attempts_exhausted(u32::MAX));
    }

    #[test]
    fn test_invalid_json() {
        let err = ClientConfig::from_json(r#"{ "reconnect_delay_ms": "soon" }"#).unwrap_err();
        assert!(matches!(err, ZmtpError::Config(_)));
    }
}
