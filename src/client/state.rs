//! Connection state machine states.
//!
//! ```text
//! Idle ─► Connecting ─► AwaitingHandshake ─► Ready ─► Closing ─┐
//!  ▲          ▲               │                │               ▼
//!  │          │               └────────────────┴────────► Disconnected
//!  │          │                                                │
//!  │          └──────────────── Reconnecting ◄─────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ConnectionState
// ============================================================================

/// State of a [`Client`](crate::Client)'s session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected.
    #[default]
    Idle,
    /// A socket is being opened.
    Connecting,
    /// The socket is open and the client handshake was sent.
    AwaitingHandshake,
    /// The server handshake was processed; traffic is allowed.
    Ready,
    /// The client asked the socket to close.
    Closing,
    /// The socket closed.
    Disconnected,
    /// A reconnect was requested and a new socket is about to be opened.
    Reconnecting,
}

impl ConnectionState {
    /// Returns `true` if a new socket may be opened from this state.
    #[inline]
    #[must_use]
    pub const fn can_connect(self) -> bool {
        matches!(self, Self::Idle | Self::Disconnected | Self::Reconnecting)
    }

    /// Returns `true` if queries and events may be sent.
    #[inline]
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns `true` while a socket exists that has not closed yet.
    #[inline]
    #[must_use]
    pub const fn has_socket(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::AwaitingHandshake | Self::Ready | Self::Closing
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::AwaitingHandshake => "awaiting handshake",
            Self::Ready => "ready",
            Self::Closing => "closing",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Tests
// ============================================================================
