//! Key-value persistence for leaves.
//!
//! Leaves that remember things across sessions (identity, conversation
//! data, the request archive) persist through a [`KeyValueStore`]. Values
//! are JSON strings.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

// ============================================================================
// KeyValueStore
// ============================================================================

/// String key-value storage.
pub trait KeyValueStore: Send + 'static {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: String);

    /// Removes the value stored under `key`.
    fn remove(&mut self, key: &str);
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory [`KeyValueStore`].
///
/// Clones share the same map, so a test (or a host) can keep one clone and
/// inspect what a leaf persisted through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<FxHashMap<String, String>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.lock().insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.lock().remove(key);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());

        store.set("bs-user-id", "u1".into());
        assert_eq!(store.get("bs-user-id").as_deref(), Some("u1"));

        store.set("bs-user-id", "u2".into());
        assert_eq!(store.get("bs-user-id").as_deref(), Some("u2"));
        assert_eq!(store.len(), 1);

        store.remove("bs-user-id");
        assert!(store.get("bs-user-id").is_none());
    }

    #[test]
    fn test_clones_share_entries() {
        let mut store = MemoryStore::new();
        let observer = store.clone();

        store.set("key", "value".into());
        assert_eq!(observer.get("key").as_deref(), Some("value"));
    }
}
