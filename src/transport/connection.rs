//! WebSocket transport and event loop.
//!
//! This module implements [`Transport`] on top of tokio-tungstenite.
//!
//! # Event Loop
//!
//! Every [`WebSocketTransport`] spawns one tokio task that:
//!
//! - Connects the socket (a close requested meanwhile aborts the attempt)
//! - Forwards inbound text frames to the client's [`EventSink`]
//! - Writes outbound frames in the order they were sent
//! - Reports `closed` exactly once when the socket goes away

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::Utf8Bytes;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{Envelope, RequestKind};

use super::socket::{
    ABNORMAL_CLOSE_CODE, Connector, EventSink, NO_STATUS_CODE, ReadyState, Transport,
    TransportEvent,
};

// ============================================================================
// SocketCommand
// ============================================================================

/// Internal commands for the event loop.
enum SocketCommand {
    /// Write a text frame.
    Frame(String),
    /// Close the socket with a code.
    Close(u16),
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Connector that opens real WebSocket connections.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a new connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn connect(&mut self, url: &Url, sink: EventSink) -> Result<Box<dyn Transport>> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::connection(format!("no tokio runtime to drive socket: {e}")))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ReadyState::Connecting));

        debug!(url = %url, generation = %sink.generation(), "Opening WebSocket");

        runtime.spawn(run_socket(
            url.clone(),
            sink,
            command_rx,
            Arc::clone(&state),
        ));

        Ok(Box::new(WebSocketTransport { command_tx, state }))
    }
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// A single WebSocket connection to the BotSocket server.
///
/// Dropping the transport ends its event loop.
pub struct WebSocketTransport {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    /// Ready state (shared with event loop).
    state: Arc<Mutex<ReadyState>>,
}

impl Transport for WebSocketTransport {
    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    fn send(&mut self, request: RequestKind, data: Value) -> Result<()> {
        let state = self.ready_state();
        if !state.is_open() {
            return Err(Error::socket_not_ready(state));
        }

        let frame = Envelope::new(request, data).encode()?;

        self.command_tx
            .send(SocketCommand::Frame(frame))
            .map_err(|_| Error::socket_not_ready(ReadyState::Closed))?;

        trace!(%request, "Envelope queued");
        Ok(())
    }

    fn close(&mut self, code: u16) {
        {
            let mut state = self.state.lock();
            if *state == ReadyState::Closed {
                return;
            }
            *state = ReadyState::Closing;
        }

        let _ = self.command_tx.send(SocketCommand::Close(code));
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Connects the socket and runs its event loop until it closes.
async fn run_socket(
    url: Url,
    sink: EventSink,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    state: Arc<Mutex<ReadyState>>,
) {
    let connect = connect_async(url.as_str());

    let ws_stream = tokio::select! {
        result = connect => match result {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                warn!(url = %url, error = %e, "WebSocket connection failed");
                *state.lock() = ReadyState::Closed;
                sink.emit(TransportEvent::Errored { message: e.to_string() });
                sink.emit(TransportEvent::Closed { code: ABNORMAL_CLOSE_CODE });
                return;
            }
        },

        command = wait_for_close(&mut command_rx) => {
            let code = command.unwrap_or(ABNORMAL_CLOSE_CODE);
            debug!(code, "Close requested before socket opened");
            *state.lock() = ReadyState::Closed;
            sink.emit(TransportEvent::Closed { code });
            return;
        }
    };

    *state.lock() = ReadyState::Open;
    info!(url = %url, generation = %sink.generation(), "WebSocket connection established");
    sink.emit(TransportEvent::Opened);

    let (mut ws_write, mut ws_read) = ws_stream.split();

    let code = loop {
        tokio::select! {
            // Incoming frames from server
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if !sink.emit_frame(text.as_str()) {
                            debug!("Client gone, closing socket");
                            let _ = ws_write.close().await;
                            break ABNORMAL_CLOSE_CODE;
                        }
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map_or(NO_STATUS_CODE, |f| u16::from(f.code));
                        debug!(code, "WebSocket closed by remote");
                        break code;
                    }

                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        sink.emit(TransportEvent::Errored { message: e.to_string() });
                        break ABNORMAL_CLOSE_CODE;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break ABNORMAL_CLOSE_CODE;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            // Commands from the transport handle
            command = command_rx.recv() => {
                match command {
                    Some(SocketCommand::Frame(frame)) => {
                        if let Err(e) = ws_write.send(Message::Text(frame.into())).await {
                            warn!(error = %e, "Failed to write frame");
                            sink.emit(TransportEvent::Errored { message: e.to_string() });
                            break ABNORMAL_CLOSE_CODE;
                        }
                    }

                    Some(SocketCommand::Close(code)) => {
                        debug!(code, "Closing WebSocket");
                        let frame = CloseFrame {
                            code: code.into(),
                            reason: Utf8Bytes::from_static(""),
                        };
                        if let Err(e) = ws_write.send(Message::Close(Some(frame))).await {
                            debug!(error = %e, "Failed to send close frame");
                        }
                        break code;
                    }

                    None => {
                        debug!("Transport dropped, closing socket");
                        let _ = ws_write.close().await;
                        break ABNORMAL_CLOSE_CODE;
                    }
                }
            }
        }
    };

    *state.lock() = ReadyState::Closed;
    info!(code, generation = %sink.generation(), "WebSocket connection closed");
    sink.emit(TransportEvent::Closed { code });
}

/// Waits for a close command while the socket is still connecting.
///
/// Frames queued before the socket opens cannot exist, since sends are
/// rejected until then. Returns `None` when the transport was dropped.
async fn wait_for_close(command_rx: &mut mpsc::UnboundedReceiver<SocketCommand>) -> Option<u16> {
    loop {
        match command_rx.recv().await? {
            SocketCommand::Close(code) => return Some(code),
            SocketCommand::Frame(_) => continue,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
