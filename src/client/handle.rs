//! Client handle and command channel.
//!
//! A [`ClientHandle`] lets leaves and other tasks drive a [`Client`]
//! without borrowing it. Calls are queued as [`ClientCommand`]s and run by
//! the client the next time it steps.
//!
//! The handle does not keep the client alive: once the client is dropped
//! every call returns [`Error::ClientDropped`].
//!
//! [`Client`]: crate::Client

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::identifiers::Epoch;
use crate::transport::NO_RECONNECT_CODE;

// ============================================================================
// ClientCommand
// ============================================================================

/// Reply channel of a command whose caller waits for the outcome.
pub type Reply = oneshot::Sender<Result<()>>;

/// A request queued for the client.
#[derive(Debug)]
pub enum ClientCommand {
    /// Open a new socket.
    Connect,
    /// Open a new socket after a disconnect.
    Reconnect {
        /// Epoch the reconnect was scheduled in; stale tickets are ignored.
        ticket: Option<Epoch>,
    },
    /// Close the socket.
    Disconnect {
        /// Close code.
        code: u16,
    },
    /// Send a query.
    SendQuery {
        /// The query.
        query: String,
        /// Display text, defaults to the query.
        text: Option<String>,
        /// Extra message data.
        data: Option<Value>,
        /// Where to report the outcome.
        reply: Option<Reply>,
    },
    /// Send an event.
    SendEvent {
        /// Event name.
        event: String,
        /// Event payload.
        payload: Option<Value>,
        /// Extra message data.
        data: Option<Value>,
        /// Where to report the outcome.
        reply: Option<Reply>,
    },
}

impl ClientCommand {
    /// Returns a short name for log output.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Reconnect { .. } => "reconnect",
            Self::Disconnect { .. } => "disconnect",
            Self::SendQuery { .. } => "send_query",
            Self::SendEvent { .. } => "send_event",
        }
    }
}

// ============================================================================
// ClientHandle
// ============================================================================

/// Non-owning handle to a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientHandle {
    commands: mpsc::WeakUnboundedSender<ClientCommand>,
    epoch: Arc<AtomicU64>,
}

impl ClientHandle {
    pub(crate) fn new(
        commands: &mpsc::UnboundedSender<ClientCommand>,
        epoch: &Arc<AtomicU64>,
    ) -> Self {
        Self {
            commands: commands.downgrade(),
            epoch: Arc::clone(epoch),
        }
    }

    /// Creates a handle that is not attached to any client.
    ///
    /// Every call returns [`Error::ClientDropped`]. Useful for exercising
    /// leaves on their own.
    #[must_use]
    pub fn detached() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self::new(&tx, &Arc::new(AtomicU64::new(0)))
    }

    /// Returns `true` while the client is alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.commands.upgrade().is_some()
    }

    fn submit(&self, command: ClientCommand) -> Result<()> {
        let commands = self.commands.upgrade().ok_or(Error::ClientDropped)?;
        commands.send(command).map_err(|_| Error::ClientDropped)
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Queues a connect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientDropped`] if the client is gone.
    pub fn connect(&self) -> Result<()> {
        self.submit(ClientCommand::Connect)
    }

    /// Queues a reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientDropped`] if the client is gone.
    pub fn reconnect(&self) -> Result<()> {
        self.submit(ClientCommand::Reconnect { ticket: None })
    }

    /// Queues an intentional disconnect, which is never auto-reconnected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientDropped`] if the client is gone.
    pub fn disconnect(&self) -> Result<()> {
        self.close(NO_RECONNECT_CODE)
    }

    /// Queues a disconnect with the given close code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientDropped`] if the client is gone.
    pub fn close(&self, code: u16) -> Result<()> {
        self.submit(ClientCommand::Disconnect { code })
    }

    /// Returns the client's current epoch.
    ///
    /// The epoch moves on with every connect, reconnect and disconnect.
    #[must_use]
    pub fn ticket(&self) -> Epoch {
        Epoch::new(self.epoch.load(Ordering::Acquire))
    }

    /// Queues a reconnect that only runs if the epoch is still `ticket`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientDropped`] if the client is gone.
    pub fn reconnect_if_current(&self, ticket: Epoch) -> Result<()> {
        self.submit(ClientCommand::Reconnect {
            ticket: Some(ticket),
        })
    }

    // ========================================================================
    // Messaging
    // ========================================================================

    /// Queues a query without waiting for the outcome.
    ///
    /// Failures are logged by the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientDropped`] if the client is gone.
    pub fn send_query(
        &self,
        query: impl Into<String>,
        text: Option<String>,
        data: Option<Value>,
    ) -> Result<()> {
        self.submit(ClientCommand::SendQuery {
            query: query.into(),
            text,
            data,
            reply: None,
        })
    }

    /// Queues an event without waiting for the outcome.
    ///
    /// Failures are logged by the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClientDropped`] if the client is gone.
    pub fn send_event(
        &self,
        event: impl Into<String>,
        payload: Option<Value>,
        data: Option<Value>,
    ) -> Result<()> {
        self.submit(ClientCommand::SendEvent {
            event: event.into(),
            payload,
            data,
            reply: None,
        })
    }

    /// Sends a query and waits until the client has handed it to the socket.
    ///
    /// # Errors
    ///
    /// - [`Error::ClientDropped`] if the client is gone
    /// - [`Error::ChannelClosed`] if the client dropped the command
    /// - Whatever [`Client::send_query`](crate::Client::send_query) returns
    pub async fn query(
        &self,
        query: impl Into<String>,
        text: Option<String>,
        data: Option<Value>,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(ClientCommand::SendQuery {
            query: query.into(),
            text,
            data,
            reply: Some(tx),
        })?;
        rx.await?
    }

    /// Sends an event and waits until the client has handed it to the socket.
    ///
    /// # Errors
    ///
    /// - [`Error::ClientDropped`] if the client is gone
    /// - [`Error::ChannelClosed`] if the client dropped the command
    /// - Whatever [`Client::send_event`](crate::Client::send_event) returns
    pub async fn event(
        &self,
        event: impl Into<String>,
        payload: Option<Value>,
        data: Option<Value>,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(ClientCommand::SendEvent {
            event: event.into(),
            payload,
            data,
            reply: Some(tx),
        })?;
        rx.await?
    }
}

// ============================================================================
// Tests
// ============================================================================
