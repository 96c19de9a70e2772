//! Per-connection protocol engine.
//!
//! A [`Session`] is sans-IO: the supervisor feeds it the bytes read from
//! the transport and writes out whatever it queues in its outbound buffer.
//! Every suspension point is a "not enough bytes buffered yet" check, so a
//! session can be fed one byte at a time or a whole burst at once with the
//! same result.
//!
//! ```text
//! bytes ─► FrameBuffer ─► Handshake ─► next_frame ─┬─► command ─► READY / ERROR
//!                                                  └─► data ────► Reassembler ─► Message
//! ```

use bytes::{Bytes, BytesMut};

use crate::error::{Result, ZmtpError};
use crate::handshake::{Handshake, HandshakeStage};
use crate::message::{Message, Reassembler};
use crate::protocol::{
    Command, CommandBuilder, Frame, FrameBuffer, ERROR, READY, REASON, SOCKET_TYPE,
};

/// Socket type this client announces.
pub const LOCAL_SOCKET_TYPE: &str = "SUB";

/// Only peer socket type accepted.
pub const PEER_SOCKET_TYPE: &[u8] = b"PUB";

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Transport is being opened.
    Connecting,
    /// Transport open, waiting for the peer signature.
    AwaitingGreetingEcho,
    /// Waiting for the peer version.
    AwaitingVersion,
    /// Waiting for the peer security block.
    AwaitingSecurityReply,
    /// Waiting for the peer READY command.
    ExchangingCommands,
    /// Handshake complete, messages flow.
    Ready,
}

impl ConnectionState {
    /// Check if messages can flow.
    #[inline]
    pub fn is_ready(self) -> bool {
        self == ConnectionState::Ready
    }
}

/// Output of a session for its supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Peer READY accepted; our READY is queued.
    Ready,
    /// A complete message arrived.
    Message(Message),
}

/// Protocol state for a single connection attempt.
pub struct Session {
    input: FrameBuffer,
    handshake: Handshake,
    reassembler: Reassembler,
    ready: bool,
    outbound: BytesMut,
}

impl Session {
    /// Create a session for a freshly opened transport.
    pub fn new() -> Self {
        Self::with_capacity(64 * 1024)
    }

    /// Create a session with a custom input buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            input: FrameBuffer::with_capacity(capacity),
            handshake: Handshake::new(),
            reassembler: Reassembler::new(),
            ready: false,
            outbound: BytesMut::new(),
        }
    }

    /// Current connection state as seen by this session.
    pub fn state(&self) -> ConnectionState {
        match self.handshake.stage() {
            HandshakeStage::Signature => ConnectionState::AwaitingGreetingEcho,
            HandshakeStage::Version => ConnectionState::AwaitingVersion,
            HandshakeStage::Security => ConnectionState::AwaitingSecurityReply,
            HandshakeStage::Done if self.ready => ConnectionState::Ready,
            HandshakeStage::Done => ConnectionState::ExchangingCommands,
        }
    }

    /// Check if the peer READY has been accepted.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Feed bytes read from the transport.
    ///
    /// Events are appended to `events` in wire order. Events produced
    /// before an error are kept, so the caller can deliver them before
    /// tearing the connection down.
    ///
    /// # Errors
    ///
    /// Any protocol violation. The session must not be fed again after an
    /// error.
    pub fn feed(&mut self, data: &[u8], events: &mut Vec<SessionEvent>) -> Result<()> {
        self.input.extend(data);

        if !self.handshake.is_done()
            && !self.handshake.advance(&mut self.input, &mut self.outbound)?
        {
            return Ok(());
        }

        while let Some(frame) = self.input.next_frame()? {
            self.on_frame(frame, events)?;
        }

        Ok(())
    }

    /// Take bytes queued for the transport, if any.
    pub fn take_outbound(&mut self) -> Option<Bytes> {
        if self.outbound.is_empty() {
            return None;
        }
        Some(self.outbound.split().freeze())
    }

    /// Number of chunks of a message still waiting for its final frame.
    pub fn pending_chunks(&self) -> usize {
        self.reassembler.pending_len()
    }

    fn on_frame(&mut self, frame: Frame, events: &mut Vec<SessionEvent>) -> Result<()> {
        if frame.is_command() {
            let command = Command::parse(frame.payload())?;
            tracing::debug!("Command: {} {:?}", command.name, command.properties);
            return self.on_command(command, events);
        }

        if !self.ready {
            return Err(ZmtpError::UnexpectedMessage);
        }

        let more = frame.has_more();
        if let Some(message) = self.reassembler.push(frame.payload, more) {
            events.push(SessionEvent::Message(message));
        }
        Ok(())
    }

    fn on_command(&mut self, command: Command, events: &mut Vec<SessionEvent>) -> Result<()> {
        match command.name.as_str() {
            READY if !self.ready => {
                let socket_type = command.get(SOCKET_TYPE).unwrap_or_default();
                if socket_type != PEER_SOCKET_TYPE {
                    return Err(ZmtpError::UnsupportedPeerRole(
                        String::from_utf8_lossy(socket_type).into_owned(),
                    ));
                }

                let reply = CommandBuilder::new(READY)
                    .property(SOCKET_TYPE, LOCAL_SOCKET_TYPE)
                    .build_frame()?;
                self.outbound.extend_from_slice(&reply);
                self.ready = true;
                events.push(SessionEvent::Ready);
                Ok(())
            }
            READY => Err(ZmtpError::UnexpectedCommand(command.name.clone())),
            ERROR => {
                let reason = command.get(REASON).unwrap_or_default();
                tracing::warn!(
                    "Authentication error: {}",
                    String::from_utf8_lossy(reason)
                );
                Ok(())
            }
            _ if !self.ready => Err(ZmtpError::UnexpectedCommand(command.name.clone())),
            _ => {
                tracing::debug!("Ignoring command {}", command.name);
                Ok(())
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
