//! Connection status notifications.
//!
//! [`StatusEventsLeaf`] turns lifecycle hooks into [`StatusEvent`]s on a
//! channel, so a UI can show "connecting", "reconnecting in 3s" and the
//! like without being a leaf itself.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tracing::trace;

use crate::leaf::{Hook, HookSet, Leaf};

// ============================================================================
// StatusEvent
// ============================================================================

/// A change in connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusEvent {
    /// A socket is about to be opened.
    Connecting {
        /// `true` when reconnecting after a disconnect.
        is_reconnection: bool,
    },
    /// The socket opened.
    Connected,
    /// The server handshake completed.
    Ready,
    /// The client is closing the socket.
    Disconnecting {
        /// Close code.
        code: u16,
    },
    /// The socket closed.
    Disconnected {
        /// Close code.
        code: u16,
    },
    /// The socket reported an error.
    Errored,
    /// One second of a reconnect countdown passed.
    ReconnectCountdown {
        /// Seconds left until the reconnect.
        seconds_remaining: u64,
    },
}

impl StatusEvent {
    /// Returns the event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connecting { .. } => "status.connecting",
            Self::Connected => "status.connect",
            Self::Ready => "status.ready",
            Self::Disconnecting { .. } => "status.disconnecting",
            Self::Disconnected { .. } => "status.disconnect",
            Self::Errored => "status.error",
            Self::ReconnectCountdown { .. } => "status.reconnect.countdown",
        }
    }
}

/// Sending half of a status channel.
pub type StatusSender = mpsc::UnboundedSender<StatusEvent>;

/// Sends a status event, ignoring a closed channel.
pub(crate) fn emit(sender: &StatusSender, event: StatusEvent) {
    trace!(event = event.name(), "Status event");
    let _ = sender.send(event);
}

// ============================================================================
// StatusEventsLeaf
// ============================================================================

/// Reports lifecycle hooks as [`StatusEvent`]s.
#[derive(Debug, Clone)]
pub struct StatusEventsLeaf {
    sender: StatusSender,
}

impl StatusEventsLeaf {
    /// Creates a leaf reporting to `sender`.
    #[must_use]
    pub fn new(sender: StatusSender) -> Self {
        Self { sender }
    }

    /// Creates a leaf together with the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Leaf for StatusEventsLeaf {
    fn hooks(&self) -> HookSet {
        [
            Hook::PreConnect,
            Hook::PostConnect,
            Hook::PreDisconnect,
            Hook::PostDisconnect,
            Hook::Errored,
            Hook::PostHandshake,
        ]
        .into_iter()
        .collect()
    }

    fn pre_connect(&mut self, is_reconnecting: bool) {
        emit(
            &self.sender,
            StatusEvent::Connecting {
                is_reconnection: is_reconnecting,
            },
        );
    }

    fn post_connect(&mut self) {
        emit(&self.sender, StatusEvent::Connected);
    }

    fn pre_disconnect(&mut self, code: u16) {
        emit(&self.sender, StatusEvent::Disconnecting { code });
    }

    fn post_disconnect(&mut self, code: u16) {
        emit(&self.sender, StatusEvent::Disconnected { code });
    }

    fn errored(&mut self) {
        emit(&self.sender, StatusEvent::Errored);
    }

    fn post_handshake(&mut self) {
        emit(&self.sender, StatusEvent::Ready);
    }
}

// ============================================================================
// Tests
// ============================================================================
