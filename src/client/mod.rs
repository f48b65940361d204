//! BotSocket session client.
//!
//! This module provides the main entry point: a [`Client`] that connects
//! to a BotSocket server, performs the handshake, and sends queries and
//! events through its leaves.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Session state machine |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`SessionOptions`] | Identity, timezone and capabilities |
//! | [`ClientHandle`] | Non-owning handle for leaves and tasks |
//! | [`ConnectionState`] | Session state |
//!
//! # Example
//!
//! ```no_run
//! use botsocket_client::{Client, Result};
//! use botsocket_client::leaves::AutoReconnectLeaf;
//!
//! # async fn example() -> Result<()> {
//! let mut client = Client::builder()
//!     .url("wss://bots.example.com/socket")
//!     .timezone("Pacific/Auckland")
//!     .leaf(AutoReconnectLeaf::new())
//!     .build()?;
//!
//! let handle = client.handle();
//! client.connect()?;
//!
//! tokio::spawn(async move {
//!     let _ = handle.query("hello", None, None).await;
//! });
//!
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Client handle and command channel.
pub mod handle;

/// Session options.
pub mod options;

/// Connection states.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use core::Client;
pub use handle::{ClientCommand, ClientHandle};
pub use options::{DEFAULT_RETRY_WAIT_TIME, SessionOptions};
pub use state::ConnectionState;
