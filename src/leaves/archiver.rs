//! Request archive.
//!
//! [`ArchiverLeaf`] records the envelopes a session exchanges so a host can
//! restore a conversation, e.g. replaying past letters after a restart (see
//! [`TracingRendererLeaf`](super::TracingRendererLeaf)).
//!
//! | Recorded request | Hook | Note |
//! |------------------|------|------|
//! | `handshake` | supplement_client_handshake | tagged `side: "client"` |
//! | `handshake` | process_server_handshake | tagged `side: "server"` |
//! | `submit-query` | supplement_query | as sent by earlier leaves |
//! | `submit-event` | supplement_event | as sent by earlier leaves |
//! | `render-letter` | process_render_letter_request | |
//!
//! Outgoing messages are recorded as they look when they reach this leaf,
//! so register it after the leaves whose additions should be archived.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::leaf::{Hook, HookSet, Leaf};
use crate::protocol::{
    ClientHandshakeData, Envelope, EventMessage, QueryMessage, RenderLetterData, RequestKind,
    ServerHandshakeData,
};

use super::store::KeyValueStore;

// ============================================================================
// Constants
// ============================================================================

/// Default storage key of a [`StoreArchive`].
pub const DEFAULT_ARCHIVE_KEY: &str = "bs-request-archive";

/// Requests archived unless configured otherwise.
pub const DEFAULT_ARCHIVED_REQUESTS: [RequestKind; 2] =
    [RequestKind::RenderLetter, RequestKind::Handshake];

// ============================================================================
// Archive
// ============================================================================

/// Append-only storage of envelopes.
pub trait Archive: Send + 'static {
    /// Appends an envelope.
    fn push(&mut self, envelope: Envelope);

    /// Returns every archived envelope, oldest first.
    fn requests(&self) -> Vec<Envelope>;

    /// Removes every archived envelope.
    fn clear(&mut self);

    /// Returns the archived envelopes of the given kinds, oldest first.
    ///
    /// An empty `kinds` selects everything.
    fn requests_of(&self, kinds: &[RequestKind]) -> Vec<Envelope> {
        let mut requests = self.requests();
        if !kinds.is_empty() {
            requests.retain(|envelope| kinds.contains(&envelope.request));
        }
        requests
    }
}

/// An archive shared between leaves and the host.
pub type SharedArchive = Arc<Mutex<dyn Archive>>;

/// Wraps an archive for sharing.
#[must_use]
pub fn shared(archive: impl Archive) -> SharedArchive {
    Arc::new(Mutex::new(archive))
}

/// In-memory [`Archive`].
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    requests: Vec<Envelope>,
}

impl MemoryArchive {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Archive for MemoryArchive {
    fn push(&mut self, envelope: Envelope) {
        self.requests.push(envelope);
    }

    fn requests(&self) -> Vec<Envelope> {
        self.requests.clone()
    }

    fn clear(&mut self) {
        self.requests.clear();
    }
}

/// [`Archive`] kept in a [`KeyValueStore`] as one JSON array.
#[derive(Debug, Clone)]
pub struct StoreArchive<K> {
    store: K,
    key: String,
}

impl<K: KeyValueStore> StoreArchive<K> {
    /// Archives into `store` under [`DEFAULT_ARCHIVE_KEY`].
    #[must_use]
    pub fn new(store: K) -> Self {
        Self::with_key(store, DEFAULT_ARCHIVE_KEY)
    }

    /// Archives into `store` under `key`.
    #[must_use]
    pub fn with_key(store: K, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Returns the storage key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<K: KeyValueStore> Archive for StoreArchive<K> {
    fn push(&mut self, envelope: Envelope) {
        let mut requests = self.requests();
        requests.push(envelope);

        match serde_json::to_string(&requests) {
            Ok(raw) => self.store.set(&self.key, raw),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to persist archive"),
        }
    }

    fn requests(&self) -> Vec<Envelope> {
        let Some(raw) = self.store.get(&self.key) else {
            return Vec::new();
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(key = %self.key, error = %e, "Ignoring unreadable archive");
            Vec::new()
        })
    }

    fn clear(&mut self) {
        self.store.remove(&self.key);
    }
}

// ============================================================================
// ArchiverLeaf
// ============================================================================

/// Which end of the connection sent a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Client,
    Server,
}

impl Side {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

/// Records exchanged envelopes into a [`SharedArchive`].
pub struct ArchiverLeaf {
    requests_to_archive: Vec<RequestKind>,
    archive: SharedArchive,
}

impl ArchiverLeaf {
    /// Creates a leaf archiving [`DEFAULT_ARCHIVED_REQUESTS`] into `archive`.
    #[must_use]
    pub fn new(archive: SharedArchive) -> Self {
        Self {
            requests_to_archive: DEFAULT_ARCHIVED_REQUESTS.to_vec(),
            archive,
        }
    }

    /// Replaces the archived request kinds; empty archives everything.
    #[must_use]
    pub fn with_requests(mut self, kinds: impl IntoIterator<Item = RequestKind>) -> Self {
        self.requests_to_archive = kinds.into_iter().collect();
        self
    }

    /// Returns the archived request kinds.
    #[inline]
    #[must_use]
    pub fn requests_to_archive(&self) -> &[RequestKind] {
        &self.requests_to_archive
    }

    /// Returns the archive.
    #[must_use]
    pub fn archive(&self) -> SharedArchive {
        Arc::clone(&self.archive)
    }

    /// Returns the archived envelopes of the configured kinds.
    #[must_use]
    pub fn archived_requests(&self) -> Vec<Envelope> {
        self.archive.lock().requests_of(&self.requests_to_archive)
    }

    /// Returns `true` if envelopes of `kind` are archived.
    #[must_use]
    pub fn should_archive(&self, kind: RequestKind) -> bool {
        self.requests_to_archive.is_empty() || self.requests_to_archive.contains(&kind)
    }

    fn record<T: Serialize>(&self, kind: RequestKind, data: &T, side: Option<Side>) {
        if !self.should_archive(kind) {
            trace!(request = %kind, "Not archiving request");
            return;
        }

        let mut data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(e) => {
                warn!(request = %kind, error = %e, "Failed to archive request");
                return;
            }
        };

        if let (Some(side), Value::Object(map)) = (side, &mut data) {
            map.insert("side".to_string(), Value::String(side.as_str().to_string()));
        }

        debug!(request = %kind, "Archiving request");
        self.archive.lock().push(Envelope::new(kind, data));
    }
}

impl fmt::Debug for ArchiverLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiverLeaf")
            .field("requests_to_archive", &self.requests_to_archive)
            .finish_non_exhaustive()
    }
}

impl Leaf for ArchiverLeaf {
    fn hooks(&self) -> HookSet {
        [
            Hook::SupplementClientHandshake,
            Hook::SupplementQuery,
            Hook::SupplementEvent,
            Hook::ProcessServerHandshake,
            Hook::ProcessRenderLetterRequest,
        ]
        .into_iter()
        .collect()
    }

    fn supplement_client_handshake(
        &mut self,
        _original: &ClientHandshakeData,
        previous: ClientHandshakeData,
    ) -> ClientHandshakeData {
        self.record(RequestKind::Handshake, &previous, Some(Side::Client));
        previous
    }

    fn supplement_query(&mut self, _original: &QueryMessage, previous: QueryMessage) -> QueryMessage {
        self.record(RequestKind::SubmitQuery, &previous, None);
        previous
    }

    fn supplement_event(&mut self, _original: &EventMessage, previous: EventMessage) -> EventMessage {
        self.record(RequestKind::SubmitEvent, &previous, None);
        previous
    }

    fn process_server_handshake(&mut self, data: &ServerHandshakeData) {
        self.record(RequestKind::Handshake, data, Some(Side::Server));
    }

    fn process_render_letter_request(&mut self, data: &RenderLetterData) {
        self.record(RequestKind::RenderLetter, data, None);
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
    use crate::leaves::MemoryStore;
    use crate::transport::MemoryServer;

    fn session(leaf: ArchiverLeaf) -> (MemoryServer, Client) {
        let server = MemoryServer::new();
        let mut client = Client::builder()
            .url("ws://bots.local")
            .connector(server.connector())
            .leaf(leaf)
            .build()
            .expect("build");

        client.connect().expect("connect");
        server.open();
        server.handshake(json!({ "userId": "u1" }));
        server.render_letter(json!([{ "type": "text", "text": "hello" }]));
        client.drain().expect("drain");
        client.send_query("hi", None, None).expect("query");

        (server, client)
    }

    #[test]
    fn test_default_kinds() {
        let archive = shared(MemoryArchive::new());
        let _session = session(ArchiverLeaf::new(Arc::clone(&archive)));

        let requests = archive.lock().requests();
        let kinds: Vec<_> = requests.iter().map(|e| e.request).collect();
        assert_eq!(
            kinds,
            vec![
                RequestKind::Handshake,
                RequestKind::Handshake,
                RequestKind::RenderLetter
            ]
        );
        assert_eq!(requests[0].data["side"], json!("client"));
        assert_eq!(requests[1].data["side"], json!("server"));
        assert_eq!(requests[1].data["userId"], json!("u1"));
        assert_eq!(requests[2].data["letter"][0]["text"], json!("hello"));
    }

    #[test]
    fn test_empty_kinds_archive_everything() {
        let archive = shared(MemoryArchive::new());
        let _session = session(ArchiverLeaf::new(Arc::clone(&archive)).with_requests([]));

        let requests = archive.lock().requests_of(&[RequestKind::SubmitQuery]);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].data["query"], json!("hi"));
        assert_eq!(requests[0].data["data"]["senderId"], json!("u1"));
    }

    #[test]
    fn test_store_archive_persists_as_json_array() {
        let backing = MemoryStore::new();
        let mut archive = StoreArchive::new(backing.clone());

        archive.push(Envelope::new(RequestKind::RenderLetter, json!({ "letter": [] })));
        archive.push(Envelope::new(RequestKind::Handshake, json!({ "side": "server" })));

        let raw = backing.get(DEFAULT_ARCHIVE_KEY).expect("persisted");
        let value: Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value[0]["request"], json!("render-letter"));

        let reopened = StoreArchive::new(backing);
        assert_eq!(reopened.requests_of(&[RequestKind::Handshake]).len(), 1);
        assert_eq!(reopened.requests().len(), 2);
    }

    #[test]
    fn test_store_archive_clear() {
        let backing = MemoryStore::new();
        let mut archive = StoreArchive::new(backing.clone());

        archive.push(Envelope::new(RequestKind::Handshake, json!({})));
        archive.clear();

        assert!(archive.requests().is_empty());
        assert!(backing.is_empty());
    }
}
