//! Transport contract.
//!
//! A [`Transport`] owns exactly one socket. It is created by a
//! [`Connector`] on every connect and reports what happens to its socket
//! through an [`EventSink`]:
//!
//! | Event | Meaning |
//! |-------|---------|
//! | [`TransportEvent::Opened`] | Socket is open, sends are allowed |
//! | [`TransportEvent::Messaged`] | A well-formed envelope arrived |
//! | [`TransportEvent::Errored`] | Socket reported an error |
//! | [`TransportEvent::Closed`] | Socket is closed, with its close code |
//!
//! A closed transport is never reused; the client asks its connector for a
//! new one.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{trace, warn};
use url::Url;

use crate::error::Result;
use crate::identifiers::Generation;
use crate::protocol::{RawEnvelope, RequestKind};

// ============================================================================
// Constants
// ============================================================================

/// Close code for an intentional disconnect; never triggers auto-reconnect.
pub const NO_RECONNECT_CODE: u16 = 3001;

/// Close code reported when the socket dropped without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Close code reported when a close frame carried no status.
pub const NO_STATUS_CODE: u16 = 1005;

// ============================================================================
// ReadyState
// ============================================================================

/// Ready state of a transport's socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    /// The connection is not yet open.
    Connecting,
    /// The connection is open and ready to communicate.
    Open,
    /// The connection is in the process of closing.
    Closing,
    /// The connection is closed or couldn't be opened.
    Closed,
}

impl ReadyState {
    /// Returns `true` if the socket can send.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Describes the state in words, for error messages.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Connecting => "the connection is not yet open",
            Self::Open => "the connection is open and ready to communicate",
            Self::Closing => "the connection is in the process of closing",
            Self::Closed => "the connection is closed or couldn't be opened",
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Something that happened to a transport's socket.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Socket opened.
    Opened,
    /// Socket closed with the given code.
    Closed {
        /// Close code.
        code: u16,
    },
    /// Socket errored.
    Errored {
        /// Description of the error.
        message: String,
    },
    /// A well-formed envelope arrived.
    Messaged(RawEnvelope),
}

/// A transport event tagged with the generation of its transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    /// Generation of the transport that emitted the event.
    pub generation: Generation,
    /// The event.
    pub event: TransportEvent,
}

// ============================================================================
// EventSink
// ============================================================================

/// Delivers the events of one transport to its client.
#[derive(Debug, Clone)]
pub struct EventSink {
    /// Generation stamped onto every event.
    generation: Generation,
    /// Client's transport event channel.
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    /// Creates a sink for the given generation.
    #[inline]
    #[must_use]
    pub fn new(generation: Generation, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    /// Returns the generation of the transport this sink belongs to.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Emits an event.
    ///
    /// Returns `false` if the client is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        trace!(generation = %self.generation, ?event, "Transport event");

        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    /// Decodes a text frame and emits it as [`TransportEvent::Messaged`].
    ///
    /// Malformed frames are logged and discarded.
    pub fn emit_frame(&self, text: &str) -> bool {
        match RawEnvelope::decode(text) {
            Ok(envelope) => self.emit(TransportEvent::Messaged(envelope)),
            Err(e) => {
                warn!(generation = %self.generation, error = %e, text = %text, "Server sent malformed envelope");
                true
            }
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// One socket to the BotSocket server.
pub trait Transport: Send {
    /// Returns the ready state of the socket.
    fn ready_state(&self) -> ReadyState;

    /// Returns `true` if the socket is open.
    fn is_connected(&self) -> bool {
        self.ready_state().is_open()
    }

    /// Frames and sends an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SocketNotReady`](crate::Error::SocketNotReady) if
    /// the socket is not open.
    fn send(&mut self, request: RequestKind, data: Value) -> Result<()>;

    /// Requests a graceful close with the given code.
    ///
    /// A [`TransportEvent::Closed`] follows once the socket is closed.
    fn close(&mut self, code: u16);
}

// ============================================================================
// Connector
// ============================================================================

/// Creates a new [`Transport`] for every connection attempt.
pub trait Connector: Send {
    /// Starts connecting a new socket to `url`.
    ///
    /// The returned transport starts in [`ReadyState::Connecting`] and
    /// reports through `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection attempt could not be started.
    fn connect(&mut self, url: &Url, sink: EventSink) -> Result<Box<dyn Transport>>;
}

// ============================================================================
// Tests
// ============================================================================
