//! Conversation data on every message.
//!
//! Bots often keep conversational state on the client: a `context` naming
//! the current topic and a free-form `conversationStore` object. The
//! [`ConversationDataLeaf`] sends both with every query and event, as
//! `data.context` and `data.conversationStore`.
//!
//! A persisted leaf keeps the values in a [`KeyValueStore`] so they survive
//! a restart: the context as-is under `bs-conversation-context` and the
//! store as a JSON string under `bs-conversation-store`.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};
use tracing::warn;

use crate::leaf::{Hook, HookSet, Leaf};
use crate::protocol::{EventMessage, MessageData, QueryMessage};

use super::store::{KeyValueStore, MemoryStore};

// ============================================================================
// Constants
// ============================================================================

/// Default storage key of the context.
pub const DEFAULT_CONTEXT_KEY: &str = "bs-conversation-context";

/// Default storage key of the conversation store.
pub const DEFAULT_STORE_KEY: &str = "bs-conversation-store";

// ============================================================================
// ConversationDataLeaf
// ============================================================================

/// Adds `data.context` and `data.conversationStore` to queries and events.
#[derive(Debug, Clone)]
pub struct ConversationDataLeaf<K = MemoryStore> {
    context: String,
    conversation_store: Map<String, Value>,
    persistence: Option<Persistence<K>>,
}

#[derive(Debug, Clone)]
struct Persistence<K> {
    store: K,
    context_key: String,
    store_key: String,
}

impl ConversationDataLeaf {
    /// Creates a leaf keeping the values in memory.
    #[must_use]
    pub fn new(context: impl Into<String>, conversation_store: Map<String, Value>) -> Self {
        Self {
            context: context.into(),
            conversation_store,
            persistence: None,
        }
    }
}

impl Default for ConversationDataLeaf {
    fn default() -> Self {
        Self::new(String::new(), Map::new())
    }
}

impl<K: KeyValueStore> ConversationDataLeaf<K> {
    /// Creates a leaf keeping the values in `store` under the default keys.
    #[must_use]
    pub fn persisted(store: K) -> Self {
        Self::persisted_with_keys(store, DEFAULT_CONTEXT_KEY, DEFAULT_STORE_KEY)
    }

    /// Creates a leaf keeping the values in `store` under the given keys.
    #[must_use]
    pub fn persisted_with_keys(
        store: K,
        context_key: impl Into<String>,
        store_key: impl Into<String>,
    ) -> Self {
        Self {
            context: String::new(),
            conversation_store: Map::new(),
            persistence: Some(Persistence {
                store,
                context_key: context_key.into(),
                store_key: store_key.into(),
            }),
        }
    }

    /// Returns `true` if the values live in a [`KeyValueStore`].
    #[inline]
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.persistence.is_some()
    }

    /// Returns the context.
    #[must_use]
    pub fn context(&self) -> String {
        match &self.persistence {
            Some(p) => p.store.get(&p.context_key).unwrap_or_default(),
            None => self.context.clone(),
        }
    }

    /// Replaces the context.
    pub fn set_context(&mut self, context: impl Into<String>) {
        let context = context.into();

        match &mut self.persistence {
            Some(p) => p.store.set(&p.context_key, context),
            None => self.context = context,
        }
    }

    /// Returns the conversation store.
    ///
    /// A persisted store that is missing or not a JSON object reads as
    /// empty.
    #[must_use]
    pub fn conversation_store(&self) -> Map<String, Value> {
        let Some(p) = &self.persistence else {
            return self.conversation_store.clone();
        };

        let Some(raw) = p.store.get(&p.store_key) else {
            return Map::new();
        };

        match serde_json::from_str(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => {
                warn!(key = %p.store_key, error = %e, "Ignoring unreadable conversation store");
                Map::new()
            }
        }
    }

    /// Replaces the conversation store.
    pub fn set_conversation_store(&mut self, conversation_store: Map<String, Value>) {
        match &mut self.persistence {
            Some(p) => {
                let raw = Value::Object(conversation_store).to_string();
                p.store.set(&p.store_key, raw);
            }
            None => self.conversation_store = conversation_store,
        }
    }

    fn stamp(&self, data: &mut MessageData) {
        data.insert("context", Value::String(self.context()));
        data.insert("conversationStore", Value::Object(self.conversation_store()));
    }
}

impl<K: KeyValueStore> Leaf for ConversationDataLeaf<K> {
    fn hooks(&self) -> HookSet {
        HookSet::from(Hook::SupplementQuery).with(Hook::SupplementEvent)
    }

    fn supplement_query(&mut self, _original: &QueryMessage, mut previous: QueryMessage) -> QueryMessage {
        self.stamp(&mut previous.data);
        previous
    }

    fn supplement_event(&mut self, _original: &EventMessage, mut previous: EventMessage) -> EventMessage {
        self.stamp(&mut previous.data);
        previous
    }
}

// ============================================================================
// Tests
// ============================================================================
