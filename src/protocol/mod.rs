//! BotSocket wire protocol.
//!
//! This module defines the envelope format and the message shapes exchanged
//! between the client and the BotSocket server.
//!
//! # Protocol Overview
//!
//! | Request | Direction | Data |
//! |---------|-----------|------|
//! | `handshake` | Client → Server | [`ClientHandshakeData`] |
//! | `handshake` | Server → Client | [`ServerHandshakeData`] |
//! | `submit-query` | Client → Server | [`QueryMessage`] |
//! | `submit-event` | Client → Server | [`EventMessage`] |
//! | `render-letter` | Server → Client | [`RenderLetterData`] |
//!
//! `render-messages` is accepted inbound as a deprecated alias of
//! `render-letter`.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Envelope codec and inbound classification |
//! | `message` | Typed payloads |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope codec and inbound classification.
pub mod envelope;

/// Typed message payloads.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{Envelope, Inbound, RawEnvelope, RequestKind};
pub use message::{
    ClientHandshakeData, EventMessage, LatLng, Letter, Message, MessageData, QueryMessage,
    RenderLetterData, SenderClass, ServerHandshakeData,
};
