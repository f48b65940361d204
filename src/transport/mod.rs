//! Transport layer.
//!
//! A transport owns exactly one socket to the BotSocket server and turns
//! whatever happens to it into [`TransportEvent`]s. It knows the envelope
//! framing and nothing else about the protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Client (Rust)  │                              │  BotSocket      │
//! │                 │         WebSocket            │  Server         │
//! │  Connector      │─────────────────────────────►│                 │
//! │  → Transport    │◄────────────────────────────►│                 │
//! │  → EventSink    │     {request, data} JSON     │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Connector::connect` - Create a fresh transport tagged with a generation
//! 2. `TransportEvent::Opened` - Socket is open, the client handshakes
//! 3. `Transport::send` - Frame and send envelopes
//! 4. `TransportEvent::Messaged` - Inbound envelopes, in arrival order
//! 5. `Transport::close` / `TransportEvent::Closed` - Socket is gone for good
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `socket` | Transport contract, ready state and events |
//! | `connection` | WebSocket transport and event loop |
//! | `memory` | In-process transport for hosts and tests |

// ============================================================================
// Submodules
// ============================================================================

/// Transport contract.
pub mod socket;

/// WebSocket transport and event loop.
pub mod connection;

/// In-process scripted transport.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{WebSocketConnector, WebSocketTransport};
pub use memory::{MemoryConnector, MemoryServer, MemoryTransport};
pub use socket::{
    ABNORMAL_CLOSE_CODE, Connector, EventSink, NO_RECONNECT_CODE, NO_STATUS_CODE, ReadyState,
    TaggedEvent, Transport, TransportEvent,
};
