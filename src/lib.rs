//! BotSocket client - Composable chat bot sessions over WebSocket.
//!
//! This library connects to a BotSocket server, performs the handshake
//! that establishes the session identity, and exchanges StaMP queries,
//! events and letters with it.
//!
//! # Architecture
//!
//! The client is a small core extended by plugins:
//!
//! - **Transport**: One socket per connection attempt, `{request, data}` JSON frames
//! - **Client**: Connection state machine, handshake, dispatch of inbound requests
//! - **Leaves**: Plugins hooked into every lifecycle step and outgoing message
//!
//! Key design principles:
//!
//! - The [`Client`] is owned by one task and driven by [`Client::run`]
//! - Leaves never borrow the client; they act on it through a [`ClientHandle`]
//! - Outgoing messages are folded through every leaf in registration order
//! - Events of a replaced socket are discarded by generation
//!
//! # Quick Start
//!
//! ```no_run
//! use botsocket_client::{Client, Result};
//! use botsocket_client::leaves::{AutoReconnectLeaf, LetterEventsLeaf};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (letters, mut letter_rx) = LetterEventsLeaf::channel();
//!
//!     let mut client = Client::builder()
//!         .url("wss://bots.example.com/socket")
//!         .timezone("Pacific/Auckland")
//!         .leaf(AutoReconnectLeaf::new())
//!         .leaf(letters)
//!         .build()?;
//!
//!     let handle = client.handle();
//!     client.connect()?;
//!
//!     tokio::spawn(async move {
//!         while let Some(letter) = letter_rx.recv().await {
//!             for message in letter {
//!                 println!("bot: {:?}", message.text());
//!             }
//!         }
//!     });
//!
//!     tokio::spawn(async move {
//!         let _ = handle.query("hello", None, None).await;
//!     });
//!
//!     client.run().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Session client: [`Client`], [`ClientBuilder`], [`ClientHandle`] |
//! | [`leaf`] | Plugin contract: [`Leaf`], [`Bush`], [`Hook`] |
//! | [`leaves`] | Built-in leaves |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Envelope codec and message types |
//! | [`transport`] | WebSocket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Session client.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for client entities.
pub mod identifiers;

/// The leaf plugin contract and its registry.
pub mod leaf;

/// Built-in leaves.
pub mod leaves;

/// BotSocket wire protocol.
///
/// Envelope codec and the typed payloads of each request.
pub mod protocol;

/// Transport layer.
///
/// WebSocket transport plus an in-memory transport for tests and embedding.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, ClientHandle, ConnectionState, SessionOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{Epoch, Generation, LeafId};

// Leaf types
pub use leaf::{Bush, Hook, HookSet, Leaf};

// Protocol types
pub use protocol::{
    ClientHandshakeData, Envelope, EventMessage, LatLng, Letter, Message, MessageData,
    QueryMessage, RenderLetterData, RequestKind, SenderClass, ServerHandshakeData,
};
