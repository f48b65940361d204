//! Error types for the BotSocket client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use botsocket_client::{Client, Result};
//!
//! fn greet(client: &mut Client) -> Result<()> {
//!     client.send_query("hello", None, None)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::SocketNotReady`] |
//! | Session | [`Error::HandshakePending`], [`Error::InvalidState`], [`Error::ClientDropped`] |
//! | Protocol | [`Error::UnsupportedRequestType`], [`Error::Protocol`], [`Error::MissingSenderId`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Url`], [`Error::ChannelClosed`] |
//!
//! Malformed inbound frames are never surfaced as errors: the transport
//! logs and discards them.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::client::ConnectionState;
use crate::protocol::RequestKind;
use crate::transport::ReadyState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to a public API.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// WebSocket connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A send was attempted while the transport has no open socket.
    ///
    /// Recoverable: check [`Client::is_connected`](crate::Client::is_connected)
    /// or retry after the next handshake.
    #[error("Unable to use socket, as {}", state.describe())]
    SocketNotReady {
        /// Ready state of the socket at the time of the send.
        state: ReadyState,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// A query or event was sent before the server handshake completed.
    #[error("Handshake with server not completed (state: {state})")]
    HandshakePending {
        /// Connection state at the time of the send.
        state: ConnectionState,
    },

    /// Operation not allowed in the current connection state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// Connection state at the time of the attempt.
        state: ConnectionState,
    },

    /// The client behind a [`ClientHandle`](crate::ClientHandle) no longer exists.
    #[error("Client dropped")]
    ClientDropped,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inbound envelope with an unrecognized `request`.
    ///
    /// Signals a protocol version mismatch between client and server.
    #[error("Request type {request} is currently not supported")]
    UnsupportedRequestType {
        /// The unrecognized request value.
        request: String,
    },

    /// Envelope data does not match the shape of its request.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Outbound message lost its `senderId` during supplementation.
    #[error("Outbound {request} message has no senderId")]
    MissingSenderId {
        /// Request the message was built for.
        request: RequestKind,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Endpoint URL could not be parsed.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a socket not ready error.
    #[inline]
    pub fn socket_not_ready(state: ReadyState) -> Self {
        Self::SocketNotReady { state }
    }

    /// Creates a handshake pending error.
    #[inline]
    pub fn handshake_pending(state: ConnectionState) -> Self {
        Self::HandshakePending { state }
    }

    /// Creates an invalid state error.
    #[inline]
    pub fn invalid_state(operation: &'static str, state: ConnectionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Creates an unsupported request type error.
    #[inline]
    pub fn unsupported_request_type(request: impl Into<String>) -> Self {
        Self::UnsupportedRequestType {
            request: request.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a missing sender id error.
    #[inline]
    pub fn missing_sender_id(request: RequestKind) -> Self {
        Self::MissingSenderId { request }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::SocketNotReady { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a protocol error.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedRequestType { .. }
                | Self::Protocol { .. }
                | Self::MissingSenderId { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed once the session is (re)established.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SocketNotReady { .. }
                | Self::HandshakePending { .. }
                | Self::UnsupportedRequestType { .. }
                | Self::ConnectionClosed
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_socket_not_ready_display() {
        let err = Error::socket_not_ready(ReadyState::Connecting);
        assert_eq!(
            err.to_string(),
            "Unable to use socket, as the connection is not yet open"
        );
    }

    #[test]
    fn test_unsupported_request_display() {
        let err = Error::unsupported_request_type("render-cards");
        assert_eq!(
            err.to_string(),
            "Request type render-cards is currently not supported"
        );
        assert!(err.is_protocol_error());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_invalid_state_display() {
        let err = Error::invalid_state("connect", ConnectionState::Ready);
        assert_eq!(err.to_string(), "Cannot connect while ready");
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::socket_not_ready(ReadyState::Closed).is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::handshake_pending(ConnectionState::AwaitingHandshake).is_recoverable());
        assert!(!Error::config("test").is_recoverable());
        assert!(!Error::ClientDropped.is_recoverable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::Url(_)));
    }
}
