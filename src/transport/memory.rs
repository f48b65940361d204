//! In-process transport.
//!
//! [`MemoryServer`] plays the server side of a BotSocket conversation
//! without any network. Every connect through its [`MemoryConnector`]
//! replaces the server's current transport; the server then scripts what
//! that transport reports and records what the client sent.
//!
//! # Example
//!
//! ```ignore
//! use botsocket_client::transport::MemoryServer;
//! use serde_json::json;
//!
//! let server = MemoryServer::new();
//! let mut client = Client::builder()
//!     .url("ws://bots.local")
//!     .connector(server.connector())
//!     .build()?;
//!
//! client.connect()?;
//! server.open();
//! server.handshake(json!({ "userId": "u1", "retryWaitTime": 2 }));
//! client.drain()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::Generation;
use crate::protocol::{Envelope, RawEnvelope, RequestKind};

use super::socket::{
    ABNORMAL_CLOSE_CODE, Connector, EventSink, ReadyState, Transport, TransportEvent,
};

// ============================================================================
// Server State
// ============================================================================

/// The server's view of the transport it is currently talking to.
struct Endpoint {
    sink: EventSink,
    state: Arc<Mutex<ReadyState>>,
}

#[derive(Default)]
struct ServerState {
    /// Number of transports created so far.
    connects: usize,
    /// Open every transport as soon as it is created.
    auto_open: bool,
    /// Most recent transport.
    current: Option<Endpoint>,
    /// Every envelope sent by any transport, with its generation.
    sent: Vec<(Generation, Envelope)>,
}

// ============================================================================
// MemoryServer
// ============================================================================

/// Scripted server side of an in-process transport.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryServer {
    inner: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    /// Creates a server whose transports wait for [`MemoryServer::open`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a server that opens every transport right away.
    #[must_use]
    pub fn auto_open() -> Self {
        let server = Self::default();
        server.inner.lock().auto_open = true;
        server
    }

    /// Returns a connector that creates transports attached to this server.
    #[must_use]
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
        }
    }

    /// Returns how many transports have been created.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.inner.lock().connects
    }

    /// Returns the ready state of the current transport.
    ///
    /// [`ReadyState::Closed`] if there never was one.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.inner
            .lock()
            .current
            .as_ref()
            .map_or(ReadyState::Closed, |endpoint| *endpoint.state.lock())
    }

    // ========================================================================
    // Scripting
    // ========================================================================

    /// Opens the current transport.
    ///
    /// Returns `false` if there is no transport still connecting.
    pub fn open(&self) -> bool {
        let inner = self.inner.lock();
        let Some(endpoint) = inner.current.as_ref() else {
            return false;
        };

        {
            let mut state = endpoint.state.lock();
            if *state != ReadyState::Connecting {
                return false;
            }
            *state = ReadyState::Open;
        }

        endpoint.sink.emit(TransportEvent::Opened)
    }

    /// Pushes an envelope to the client.
    pub fn push(&self, request: &str, data: Value) -> bool {
        self.emit(TransportEvent::Messaged(RawEnvelope {
            request: request.to_string(),
            data,
        }))
    }

    /// Pushes a raw text frame to the client.
    ///
    /// Malformed frames are dropped the same way a socket would drop them.
    pub fn push_frame(&self, text: &str) -> bool {
        let inner = self.inner.lock();
        inner
            .current
            .as_ref()
            .is_some_and(|endpoint| endpoint.sink.emit_frame(text))
    }

    /// Pushes the server's half of the handshake.
    pub fn handshake(&self, data: Value) -> bool {
        self.push(RequestKind::Handshake.as_str(), data)
    }

    /// Pushes a `render-letter` envelope carrying `letter`.
    pub fn render_letter(&self, letter: Value) -> bool {
        self.push(
            RequestKind::RenderLetter.as_str(),
            serde_json::json!({ "letter": letter }),
        )
    }

    /// Reports a socket error on the current transport.
    pub fn error(&self, message: &str) -> bool {
        self.emit(TransportEvent::Errored {
            message: message.to_string(),
        })
    }

    /// Closes the current transport from the server side.
    pub fn close(&self, code: u16) -> bool {
        let inner = self.inner.lock();
        let Some(endpoint) = inner.current.as_ref() else {
            return false;
        };

        {
            let mut state = endpoint.state.lock();
            if *state == ReadyState::Closed {
                return false;
            }
            *state = ReadyState::Closed;
        }

        endpoint.sink.emit(TransportEvent::Closed { code })
    }

    /// Drops the current transport the way a dead network would: an error
    /// followed by an abnormal close.
    pub fn fail(&self) -> bool {
        self.error("connection lost") && self.close(ABNORMAL_CLOSE_CODE)
    }

    fn emit(&self, event: TransportEvent) -> bool {
        let inner = self.inner.lock();
        inner
            .current
            .as_ref()
            .is_some_and(|endpoint| endpoint.sink.emit(event))
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Returns every envelope sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Envelope> {
        self.inner
            .lock()
            .sent
            .iter()
            .map(|(_, envelope)| envelope.clone())
            .collect()
    }

    /// Returns every envelope of the given kind sent so far.
    #[must_use]
    pub fn sent_of(&self, request: RequestKind) -> Vec<Value> {
        self.inner
            .lock()
            .sent
            .iter()
            .filter(|(_, envelope)| envelope.request == request)
            .map(|(_, envelope)| envelope.data.clone())
            .collect()
    }

    /// Returns the last envelope sent.
    #[must_use]
    pub fn last_sent(&self) -> Option<Envelope> {
        self.inner
            .lock()
            .sent
            .last()
            .map(|(_, envelope)| envelope.clone())
    }

    /// Removes and returns every envelope sent so far.
    pub fn take_sent(&self) -> Vec<Envelope> {
        std::mem::take(&mut self.inner.lock().sent)
            .into_iter()
            .map(|(_, envelope)| envelope)
            .collect()
    }
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Connector creating [`MemoryTransport`]s attached to a [`MemoryServer`].
#[derive(Clone)]
pub struct MemoryConnector {
    server: MemoryServer,
}

impl Connector for MemoryConnector {
    fn connect(&mut self, url: &Url, sink: EventSink) -> Result<Box<dyn Transport>> {
        let state = Arc::new(Mutex::new(ReadyState::Connecting));
        let generation = sink.generation();

        let auto_open = {
            let mut inner = self.server.inner.lock();
            inner.connects += 1;
            inner.current = Some(Endpoint {
                sink: sink.clone(),
                state: Arc::clone(&state),
            });
            inner.auto_open
        };

        debug!(url = %url, %generation, "Memory transport created");

        if auto_open {
            self.server.open();
        }

        Ok(Box::new(MemoryTransport {
            generation,
            sink,
            state,
            server: Arc::clone(&self.server.inner),
        }))
    }
}

// ============================================================================
// MemoryTransport
// ============================================================================

/// Client side of an in-process transport.
pub struct MemoryTransport {
    generation: Generation,
    sink: EventSink,
    state: Arc<Mutex<ReadyState>>,
    server: Arc<Mutex<ServerState>>,
}

impl Transport for MemoryTransport {
    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    fn send(&mut self, request: RequestKind, data: Value) -> Result<()> {
        let state = self.ready_state();
        if !state.is_open() {
            return Err(Error::socket_not_ready(state));
        }

        self.server
            .lock()
            .sent
            .push((self.generation, Envelope::new(request, data)));
        Ok(())
    }

    fn close(&mut self, code: u16) {
        {
            let mut state = self.state.lock();
            if *state == ReadyState::Closed {
                return;
            }
            *state = ReadyState::Closed;
        }

        self.sink.emit(TransportEvent::Closed { code });
    }
}

// ============================================================================
// Tests
// ============================================================================
