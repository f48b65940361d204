//! Greeting event after the handshake.
//!
//! [`SendEventOnHandshakeLeaf`] sends one configured event as soon as the
//! session is ready, typically to have the bot greet the user. By default
//! the handshakes of later reconnects are skipped so the user is greeted
//! once per client.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::ClientHandle;
use crate::leaf::{Hook, HookSet, Leaf};

// ============================================================================
// SendEventOnHandshakeLeaf
// ============================================================================

/// Sends an event after every (or only the first) handshake.
#[derive(Debug, Clone)]
pub struct SendEventOnHandshakeLeaf {
    event: String,
    payload: Value,
    data: Value,
    resend_on_reconnect: bool,
    is_reconnect_handshake: bool,
    client: Option<ClientHandle>,
}

impl SendEventOnHandshakeLeaf {
    /// Creates a leaf sending `event` with an empty payload.
    #[must_use]
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload: Value::Object(Map::new()),
            data: Value::Object(Map::new()),
            resend_on_reconnect: false,
            is_reconnect_handshake: false,
            client: None,
        }
    }

    /// Sets the event payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Sets extra message data.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Also sends the event after reconnect handshakes.
    #[must_use]
    pub fn resend_on_reconnect(mut self, resend: bool) -> Self {
        self.resend_on_reconnect = resend;
        self
    }

    /// Returns the event name.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Replaces the event name.
    pub fn set_event(&mut self, event: impl Into<String>) {
        self.event = event.into();
    }
}

impl Leaf for SendEventOnHandshakeLeaf {
    fn hooks(&self) -> HookSet {
        HookSet::from(Hook::PostDisconnect).with(Hook::PostHandshake)
    }

    fn register(&mut self, client: ClientHandle) {
        self.client = Some(client);
    }

    fn deregister(&mut self) {
        self.client = None;
    }

    fn post_disconnect(&mut self, _code: u16) {
        if !self.resend_on_reconnect {
            self.is_reconnect_handshake = true;
        }
    }

    fn post_handshake(&mut self) {
        if !self.resend_on_reconnect && self.is_reconnect_handshake {
            debug!(event = %self.event, "Skipping handshake event after reconnect");
            self.is_reconnect_handshake = false;
            return;
        }

        let Some(client) = &self.client else {
            return;
        };

        if let Err(e) = client.send_event(
            self.event.clone(),
            Some(self.payload.clone()),
            Some(self.data.clone()),
        ) {
            warn!(event = %self.event, error = %e, "Failed to queue handshake event");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::Client;
    use crate::protocol::RequestKind;
    use crate::transport::{ABNORMAL_CLOSE_CODE, MemoryServer};

    fn session(server: &MemoryServer, client: &mut Client) {
        server.open();
        server.handshake(json!({ "userId": "u1" }));
        client.drain().expect("drain");
    }

    fn events(server: &MemoryServer) -> Vec<Value> {
        server.sent_of(RequestKind::SubmitEvent)
    }

    #[test]
    fn test_sends_after_first_handshake_only() {
        let server = MemoryServer::new();
        let mut client = Client::builder()
            .url("ws://bots.local")
            .connector(server.connector())
            .leaf(SendEventOnHandshakeLeaf::new("welcome").with_payload(json!({ "new": true })))
            .build()
            .expect("build");

        client.connect().expect("connect");
        session(&server, &mut client);

        let sent = events(&server);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["event"], json!("welcome"));
        assert_eq!(sent[0]["payload"], json!({ "new": true }));
        assert_eq!(sent[0]["data"]["senderId"], json!("u1"));

        server.close(ABNORMAL_CLOSE_CODE);
        client.drain().expect("drain");
        client.reconnect().expect("reconnect");
        session(&server, &mut client);

        assert_eq!(events(&server).len(), 1);
    }

    #[test]
    fn test_resends_on_reconnect_when_asked() {
        let server = MemoryServer::new();
        let mut client = Client::builder()
            .url("ws://bots.local")
            .connector(server.connector())
            .leaf(SendEventOnHandshakeLeaf::new("welcome").resend_on_reconnect(true))
            .build()
            .expect("build");

        client.connect().expect("connect");
        session(&server, &mut client);
        server.close(ABNORMAL_CLOSE_CODE);
        client.drain().expect("drain");
        client.reconnect().expect("reconnect");
        session(&server, &mut client);

        assert_eq!(events(&server).len(), 2);
    }
}
