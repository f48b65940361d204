//! Built-in leaves.
//!
//! Ready-made [`Leaf`](crate::Leaf) implementations for the concerns most
//! BotSocket clients share. None is registered by default; pick the ones a
//! host needs and pass them to [`ClientBuilder::leaf`](crate::ClientBuilder::leaf).
//!
//! # Leaves
//!
//! | Leaf | Description |
//! |------|-------------|
//! | [`AutoReconnectLeaf`] | Counts down `retryWaitTime` and reconnects after unexpected closes |
//! | [`StatusEventsLeaf`] | Reports lifecycle hooks as [`StatusEvent`]s |
//! | [`LetterEventsLeaf`] | Forwards letters to a channel |
//! | [`UserIdLeaf`] | Persists and stamps the session identity |
//! | [`TimezoneLeaf`] | Stamps a timezone |
//! | [`LocationLeaf`] | Adds `data.location` |
//! | [`ConversationDataLeaf`] | Adds `data.context` and `data.conversationStore` |
//! | [`SendEventOnHandshakeLeaf`] | Sends an event once the session is ready |
//! | [`ArchiverLeaf`] | Records exchanged envelopes |
//! | [`TracingRendererLeaf`] | Logs letters, replaying archived ones |
//!
//! # Collaborators
//!
//! Leaves that persist state do so through a [`KeyValueStore`];
//! [`MemoryStore`] is the in-process implementation.
//!
//! # Example
//!
//! ```no_run
//! use botsocket_client::{Client, Result};
//! use botsocket_client::leaves::{
//!     AutoReconnectLeaf, MemoryStore, StatusEventsLeaf, StoredUserId, UserIdLeaf,
//! };
//!
//! # fn example() -> Result<()> {
//! let (status, mut status_rx) = StatusEventsLeaf::channel();
//!
//! let client = Client::builder()
//!     .url("wss://bots.example.com/socket")
//!     .leaf(UserIdLeaf::new(StoredUserId::new(MemoryStore::new())))
//!     .leaf(AutoReconnectLeaf::new())
//!     .leaf(status)
//!     .build()?;
//! # let _ = (client, status_rx.try_recv());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Request archive.
pub mod archiver;

/// Automatic reconnection.
pub mod auto_reconnect;

/// Conversation context and store.
pub mod conversation;

/// Letter notifications.
pub mod letter;

/// Geolocation.
pub mod location;

/// Letter rendering through `tracing`.
pub mod renderer;

/// Greeting event after the handshake.
pub mod send_event;

/// Connection status notifications.
pub mod status;

/// Key-value persistence.
pub mod store;

/// Timezone stamping.
pub mod timezone;

/// Persistent session identity.
pub mod user_id;

// ============================================================================
// Re-exports
// ============================================================================

pub use archiver::{
    Archive, ArchiverLeaf, DEFAULT_ARCHIVE_KEY, DEFAULT_ARCHIVED_REQUESTS, MemoryArchive,
    SharedArchive, StoreArchive, shared,
};
pub use auto_reconnect::AutoReconnectLeaf;
pub use conversation::{ConversationDataLeaf, DEFAULT_CONTEXT_KEY, DEFAULT_STORE_KEY};
pub use letter::LetterEventsLeaf;
pub use location::{LocationLeaf, LocationProvider, StaticLocation, WatchedLocation, location_of};
pub use renderer::{TracingRendererLeaf, message_sugar};
pub use send_event::SendEventOnHandshakeLeaf;
pub use status::{StatusEvent, StatusEventsLeaf, StatusSender};
pub use store::{KeyValueStore, MemoryStore};
pub use timezone::TimezoneLeaf;
pub use user_id::{DEFAULT_USER_ID_KEY, StaticUserId, StoredUserId, UserIdLeaf, UserIdStore};
