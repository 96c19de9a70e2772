//! Error types for zmtp-client.

use thiserror::Error;

/// Main error type for all ZMTP client operations.
#[derive(Debug, Error)]
pub enum ZmtpError {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer signature did not start with 0xFF and end with 0x7F.
    #[error("Invalid greeting: {0:02x?}")]
    InvalidGreeting([u8; 10]),

    /// Peer announced a major version other than 3.
    #[error("Unsupported version: {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// Peer proposed a security mechanism other than NULL.
    #[error("Unsupported auth method: {0:?}")]
    UnsupportedMechanism(String),

    /// Peer set the as-server flag.
    #[error("Expected zero value for as-server: {0}")]
    UnexpectedServerRole(u8),

    /// Peer READY carried a socket type other than PUB.
    #[error("Only PUB sockets are supported, peer is {0:?}")]
    UnsupportedPeerRole(String),

    /// Long frame size with a non-zero high half.
    #[error("Message size {0} exceeds 32 bits")]
    OversizedMessage(u64),

    /// Command body whose length fields disagree with the frame size.
    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    /// Command not valid at the current connection stage.
    #[error("Unexpected command {0:?}")]
    UnexpectedCommand(String),

    /// Message frame received before the connection was ready.
    #[error("Message frame received before READY")]
    UnexpectedMessage,

    /// Handshake did not reach READY within the configured timeout.
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// `open` called while a connection is already open.
    #[error("Connection already open")]
    AlreadyOpen,

    /// Endpoint string could not be parsed.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Peer closed the transport.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Configuration could not be parsed.
    #[error("Invalid config: {0}")]
    Config(#[from] serde_json::Error),
}

impl ZmtpError {
    /// Whether this error is a violation of the wire protocol by the peer.
    ///
    /// Protocol violations tear down the current connection attempt and go
    /// through the normal reconnect path.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ZmtpError::InvalidGreeting(_)
                | ZmtpError::UnsupportedVersion { .. }
                | ZmtpError::UnsupportedMechanism(_)
                | ZmtpError::UnexpectedServerRole(_)
                | ZmtpError::UnsupportedPeerRole(_)
                | ZmtpError::OversizedMessage(_)
                | ZmtpError::MalformedCommand(_)
                | ZmtpError::UnexpectedCommand(_)
                | ZmtpError::UnexpectedMessage
        )
    }
}

/// Result type alias using ZmtpError.
pub type Result<T> = std::result::Result<T, ZmtpError>;
