//! Persistent session identity.
//!
//! [`UserIdLeaf`] remembers the identity the server declares during the
//! handshake and stamps it onto the next client handshake (so the session
//! is resumed after a reconnect or a restart) and onto every query and
//! event as `senderId`.
//!
//! | Store | Keeps the identity |
//! |-------|--------------------|
//! | [`StaticUserId`] | In the leaf |
//! | [`StoredUserId`] | In a [`KeyValueStore`], under `bs-user-id` by default |

// ============================================================================
// Imports
// ============================================================================

use tracing::debug;

use crate::leaf::{Hook, HookSet, Leaf};
use crate::protocol::{ClientHandshakeData, EventMessage, QueryMessage, ServerHandshakeData};

use super::store::KeyValueStore;

// ============================================================================
// Constants
// ============================================================================

/// Default storage key of the identity.
pub const DEFAULT_USER_ID_KEY: &str = "bs-user-id";

// ============================================================================
// UserIdStore
// ============================================================================

/// Where a [`UserIdLeaf`] keeps the identity.
pub trait UserIdStore: Send + 'static {
    /// Returns the stored identity.
    fn user_id(&self) -> Option<String>;

    /// Stores an identity.
    fn set_user_id(&mut self, user_id: String);
}

/// Identity kept in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticUserId(Option<String>);

impl StaticUserId {
    /// Creates a store holding `user_id`.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(Some(user_id.into()))
    }

    /// Creates an empty store.
    #[must_use]
    pub fn empty() -> Self {
        Self(None)
    }
}

impl UserIdStore for StaticUserId {
    fn user_id(&self) -> Option<String> {
        self.0.clone()
    }

    fn set_user_id(&mut self, user_id: String) {
        self.0 = Some(user_id);
    }
}

/// Identity kept in a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct StoredUserId<K> {
    store: K,
    key: String,
}

impl<K: KeyValueStore> StoredUserId<K> {
    /// Keeps the identity in `store` under [`DEFAULT_USER_ID_KEY`].
    #[must_use]
    pub fn new(store: K) -> Self {
        Self::with_key(store, DEFAULT_USER_ID_KEY)
    }

    /// Keeps the identity in `store` under `key`.
    #[must_use]
    pub fn with_key(store: K, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

impl<K: KeyValueStore> UserIdStore for StoredUserId<K> {
    fn user_id(&self) -> Option<String> {
        self.store.get(&self.key).filter(|id| !id.is_empty())
    }

    fn set_user_id(&mut self, user_id: String) {
        self.store.set(&self.key, user_id);
    }
}

// ============================================================================
// UserIdLeaf
// ============================================================================

/// Persists the server-declared identity and stamps it on outgoing traffic.
#[derive(Debug, Clone)]
pub struct UserIdLeaf<S> {
    store: S,
}

impl<S: UserIdStore> UserIdLeaf<S> {
    /// Creates a leaf keeping the identity in `store`.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the stored identity.
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.store.user_id()
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: UserIdStore> Leaf for UserIdLeaf<S> {
    fn hooks(&self) -> HookSet {
        [
            Hook::ProcessServerHandshake,
            Hook::SupplementClientHandshake,
            Hook::SupplementQuery,
            Hook::SupplementEvent,
        ]
        .into_iter()
        .collect()
    }

    fn process_server_handshake(&mut self, data: &ServerHandshakeData) {
        if let Some(user_id) = data.declared_user_id() {
            debug!(user_id, "Storing server identity");
            self.store.set_user_id(user_id.to_string());
        }
    }

    fn supplement_client_handshake(
        &mut self,
        _original: &ClientHandshakeData,
        mut previous: ClientHandshakeData,
    ) -> ClientHandshakeData {
        if let Some(user_id) = self.store.user_id() {
            previous.user_id = Some(user_id);
        }
        previous
    }

    fn supplement_query(&mut self, _original: &QueryMessage, mut previous: QueryMessage) -> QueryMessage {
        if let Some(user_id) = self.store.user_id() {
            previous.data.sender_id = user_id;
        }
        previous
    }

    fn supplement_event(&mut self, _original: &EventMessage, mut previous: EventMessage) -> EventMessage {
        if let Some(user_id) = self.store.user_id() {
            previous.data.sender_id = user_id;
        }
        previous
    }
}

// ============================================================================
// Tests
// ============================================================================
