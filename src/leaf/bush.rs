//! Leaf registry and reduction engine.
//!
//! The [`Bush`] keeps registered leaves in registration order. For every
//! hook it derives the *active branch*: the leaves whose [`HookSet`]
//! contains that hook, in registration order.
//!
//! | Hook kind | Dispatch |
//! |-----------|----------|
//! | Lifecycle | Call every leaf of the branch, in order |
//! | Transform | Left fold across the branch, seeded with the client's message |
//!
//! An empty branch is a no-op for lifecycle hooks and the identity for
//! transform hooks.

// ============================================================================
// Imports
// ============================================================================

use tracing::{debug, trace};

use crate::client::ClientHandle;
use crate::identifiers::LeafId;
use crate::protocol::{
    ClientHandshakeData, EventMessage, QueryMessage, RenderLetterData, ServerHandshakeData,
};

use super::base::Leaf;
use super::hook::{Hook, HookSet};

// ============================================================================
// Types
// ============================================================================

/// A leaf together with its registration data.
struct Registered {
    id: LeafId,
    hooks: HookSet,
    leaf: Box<dyn Leaf>,
}

// ============================================================================
// Bush
// ============================================================================

/// Ordered collection of leaves plus the hook dispatcher.
#[derive(Default)]
pub struct Bush {
    leaves: Vec<Registered>,
    next_id: u64,
}

impl Bush {
    /// Creates an empty bush.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of registered leaves.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Returns `true` if no leaf is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: LeafId) -> bool {
        self.leaves.iter().any(|entry| entry.id == id)
    }

    /// Returns the ids of all registered leaves, in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<LeafId> {
        self.leaves.iter().map(|entry| entry.id).collect()
    }

    /// Returns the hooks captured for `id` at registration.
    #[must_use]
    pub fn hooks_of(&self, id: LeafId) -> Option<HookSet> {
        self.leaves
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.hooks)
    }

    /// Returns the leaf registered as `id`.
    #[must_use]
    pub fn leaf(&self, id: LeafId) -> Option<&dyn Leaf> {
        self.leaves
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.leaf.as_ref())
    }

    /// Returns the ids of the leaves implementing `hook`, in registration
    /// order.
    #[must_use]
    pub fn active_branch(&self, hook: Hook) -> Vec<LeafId> {
        self.leaves
            .iter()
            .filter(|entry| entry.hooks.contains(hook))
            .map(|entry| entry.id)
            .collect()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Appends a leaf and binds it to `client`.
    ///
    /// The leaf's hooks are read once, here.
    pub fn register(&mut self, mut leaf: Box<dyn Leaf>, client: ClientHandle) -> LeafId {
        self.next_id += 1;
        let id = LeafId::new(self.next_id);
        let hooks = leaf.hooks();

        leaf.register(client);

        debug!(leaf = %id, name = leaf.name(), ?hooks, "Leaf registered");

        self.leaves.push(Registered { id, hooks, leaf });
        id
    }

    /// Removes a leaf, unbinds it and hands it back.
    ///
    /// Returns `None` if `id` is not registered.
    pub fn deregister(&mut self, id: LeafId) -> Option<Box<dyn Leaf>> {
        let index = self.leaves.iter().position(|entry| entry.id == id)?;
        let Registered { mut leaf, .. } = self.leaves.remove(index);

        leaf.deregister();

        debug!(leaf = %id, name = leaf.name(), "Leaf deregistered");
        Some(leaf)
    }

    /// Deregisters every leaf, in reverse registration order.
    pub fn clear(&mut self) -> Vec<Box<dyn Leaf>> {
        let mut removed = Vec::with_capacity(self.leaves.len());

        while let Some(Registered { id, mut leaf, .. }) = self.leaves.pop() {
            leaf.deregister();
            debug!(leaf = %id, name = leaf.name(), "Leaf deregistered");
            removed.push(leaf);
        }

        removed
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn branch_mut(&mut self, hook: Hook) -> impl Iterator<Item = &mut Registered> {
        self.leaves
            .iter_mut()
            .filter(move |entry| entry.hooks.contains(hook))
    }

    fn each(&mut self, hook: Hook, mut call: impl FnMut(&mut dyn Leaf)) {
        for entry in self.branch_mut(hook) {
            trace!(leaf = %entry.id, %hook, "Dispatching hook");
            call(entry.leaf.as_mut());
        }
    }

    fn fold<T>(&mut self, hook: Hook, seed: T, mut call: impl FnMut(&mut dyn Leaf, T) -> T) -> T {
        self.branch_mut(hook).fold(seed, |previous, entry| {
            trace!(leaf = %entry.id, %hook, "Reducing hook");
            call(entry.leaf.as_mut(), previous)
        })
    }

    // ========================================================================
    // Lifecycle Hooks
    // ========================================================================

    /// Dispatches [`Leaf::pre_connect`].
    pub fn pre_connect(&mut self, is_reconnecting: bool) {
        self.each(Hook::PreConnect, |leaf| leaf.pre_connect(is_reconnecting));
    }

    /// Dispatches [`Leaf::post_connect`].
    pub fn post_connect(&mut self) {
        self.each(Hook::PostConnect, |leaf| leaf.post_connect());
    }

    /// Dispatches [`Leaf::pre_disconnect`].
    pub fn pre_disconnect(&mut self, code: u16) {
        self.each(Hook::PreDisconnect, |leaf| leaf.pre_disconnect(code));
    }

    /// Dispatches [`Leaf::post_disconnect`].
    pub fn post_disconnect(&mut self, code: u16) {
        self.each(Hook::PostDisconnect, |leaf| leaf.post_disconnect(code));
    }

    /// Dispatches [`Leaf::errored`].
    pub fn errored(&mut self) {
        self.each(Hook::Errored, |leaf| leaf.errored());
    }

    /// Dispatches [`Leaf::post_handshake`].
    pub fn post_handshake(&mut self) {
        self.each(Hook::PostHandshake, |leaf| leaf.post_handshake());
    }

    /// Dispatches [`Leaf::process_server_handshake`].
    pub fn process_server_handshake(&mut self, data: &ServerHandshakeData) {
        self.each(Hook::ProcessServerHandshake, |leaf| {
            leaf.process_server_handshake(data);
        });
    }

    /// Dispatches [`Leaf::process_render_letter_request`].
    ///
    /// Every leaf of the branch receives the same, untransformed letter.
    pub fn process_render_letter_request(&mut self, data: &RenderLetterData) {
        self.each(Hook::ProcessRenderLetterRequest, |leaf| {
            leaf.process_render_letter_request(data);
        });
    }

    // ========================================================================
    // Transform Hooks
    // ========================================================================

    /// Reduces [`Leaf::supplement_client_handshake`] over the branch.
    #[must_use]
    pub fn supplement_client_handshake(&mut self, seed: ClientHandshakeData) -> ClientHandshakeData {
        let original = seed.clone();
        self.fold(Hook::SupplementClientHandshake, seed, |leaf, previous| {
            leaf.supplement_client_handshake(&original, previous)
        })
    }

    /// Reduces [`Leaf::supplement_query`] over the branch.
    #[must_use]
    pub fn supplement_query(&mut self, seed: QueryMessage) -> QueryMessage {
        let original = seed.clone();
        self.fold(Hook::SupplementQuery, seed, |leaf, previous| {
            leaf.supplement_query(&original, previous)
        })
    }

    /// Reduces [`Leaf::supplement_event`] over the branch.
    #[must_use]
    pub fn supplement_event(&mut self, seed: EventMessage) -> EventMessage {
        let original = seed.clone();
        self.fold(Hook::SupplementEvent, seed, |leaf, previous| {
            leaf.supplement_event(&original, previous)
        })
    }
}

impl std::fmt::Debug for Bush {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.leaves
                    .iter()
                    .map(|entry| (entry.id, entry.leaf.name(), entry.hooks)),
            )
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::{Value, json};

    use crate::protocol::MessageData;

    /// Appends its tag to `data.trail` and logs every call.
    struct Tagger {
        tag: &'static str,
        hooks: HookSet,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Tagger {
        fn new(tag: &'static str, hooks: HookSet, log: &Arc<Mutex<Vec<String>>>) -> Box<Self> {
            Box::new(Self {
                tag,
                hooks,
                log: Arc::clone(log),
            })
        }
    }

    impl Leaf for Tagger {
        fn hooks(&self) -> HookSet {
            self.hooks
        }

        fn register(&mut self, _client: ClientHandle) {
            self.log.lock().push(format!("{}:register", self.tag));
        }

        fn deregister(&mut self) {
            self.log.lock().push(format!("{}:deregister", self.tag));
        }

        fn post_disconnect(&mut self, code: u16) {
            self.log.lock().push(format!("{}:post_disconnect:{code}", self.tag));
        }

        fn process_render_letter_request(&mut self, data: &RenderLetterData) {
            self.log
                .lock()
                .push(format!("{}:letter:{}", self.tag, data.letter.len()));
        }

        fn supplement_query(&mut self, original: &QueryMessage, mut previous: QueryMessage) -> QueryMessage {
            assert!(original.data.get("trail").is_none());

            let trail = match previous.data.get("trail") {
                Some(Value::String(trail)) => format!("{trail},{}", self.tag),
                _ => self.tag.to_string(),
            };
            previous.data.insert("trail", Value::String(trail));
            previous
        }
    }

    fn query() -> QueryMessage {
        QueryMessage::new("hi", None, MessageData::new("u1"))
    }

    #[test]
    fn test_empty_branch_is_identity() {
        let mut bush = Bush::new();
        let seed = query();

        assert_eq!(bush.supplement_query(seed.clone()), seed);
        bush.post_disconnect(1006);
    }

    #[test]
    fn test_fold_is_left_associative() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bush = Bush::new();
        let hooks = HookSet::from(Hook::SupplementQuery);

        bush.register(Tagger::new("l1", hooks, &log), ClientHandle::detached());
        bush.register(Tagger::new("l2", hooks, &log), ClientHandle::detached());
        bush.register(Tagger::new("l3", hooks, &log), ClientHandle::detached());

        let result = bush.supplement_query(query());
        assert_eq!(result.data.get("trail"), Some(&json!("l1,l2,l3")));
        assert_eq!(result.data.sender_id, "u1");
    }

    #[test]
    fn test_leaves_without_hook_are_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bush = Bush::new();

        bush.register(
            Tagger::new("query", HookSet::from(Hook::SupplementQuery), &log),
            ClientHandle::detached(),
        );
        bush.register(
            Tagger::new("close", HookSet::from(Hook::PostDisconnect), &log),
            ClientHandle::detached(),
        );

        bush.post_disconnect(1006);
        let result = bush.supplement_query(query());

        assert_eq!(result.data.get("trail"), Some(&json!("query")));
        assert_eq!(
            *log.lock(),
            vec![
                "query:register",
                "close:register",
                "close:post_disconnect:1006"
            ]
        );
    }

    #[test]
    fn test_letter_reaches_every_leaf_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bush = Bush::new();
        let hooks = HookSet::from(Hook::ProcessRenderLetterRequest);

        bush.register(Tagger::new("a", hooks, &log), ClientHandle::detached());
        bush.register(Tagger::new("b", hooks, &log), ClientHandle::detached());
        log.lock().clear();

        let letter = serde_json::from_value(json!([{ "type": "text", "text": "hi" }]))
            .expect("letter");
        bush.process_render_letter_request(&RenderLetterData::new(letter));

        assert_eq!(*log.lock(), vec!["a:letter:1", "b:letter:1"]);
    }

    #[test]
    fn test_deregister_twice_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bush = Bush::new();
        let hooks = HookSet::from(Hook::SupplementQuery);

        let first = bush.register(Tagger::new("a", hooks, &log), ClientHandle::detached());
        let second = bush.register(Tagger::new("b", hooks, &log), ClientHandle::detached());

        assert!(bush.deregister(first).is_some());
        assert!(bush.deregister(first).is_none());

        assert_eq!(bush.active_branch(Hook::SupplementQuery), vec![second]);
        assert_eq!(
            *log.lock(),
            vec!["a:register", "b:register", "a:deregister"]
        );
    }

    #[test]
    fn test_clear_deregisters_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bush = Bush::new();

        bush.register(Tagger::new("a", HookSet::EMPTY, &log), ClientHandle::detached());
        bush.register(Tagger::new("b", HookSet::EMPTY, &log), ClientHandle::detached());
        log.lock().clear();

        assert_eq!(bush.clear().len(), 2);
        assert!(bush.is_empty());
        assert_eq!(*log.lock(), vec!["b:deregister", "a:deregister"]);
    }

    // ========================================================================
    // Properties
    // ========================================================================

    #[derive(Debug, Clone)]
    enum Op {
        Register(u16),
        Deregister(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u16..(1 << Hook::ALL.len())).prop_map(Op::Register),
            any::<usize>().prop_map(Op::Deregister),
        ]
    }

    struct Masked(HookSet);

    impl Leaf for Masked {
        fn hooks(&self) -> HookSet {
            self.0
        }
    }

    fn mask(bits: u16) -> HookSet {
        Hook::ALL
            .into_iter()
            .enumerate()
            .filter(|(index, _)| bits & (1 << index) != 0)
            .map(|(_, hook)| hook)
            .collect()
    }

    proptest! {
        #[test]
        fn prop_active_branch_matches_model(ops in prop::collection::vec(op(), 0..40)) {
            let mut bush = Bush::new();
            let mut model: Vec<(LeafId, HookSet)> = Vec::new();
            let mut ever: Vec<LeafId> = Vec::new();

            for op in ops {
                match op {
                    Op::Register(bits) => {
                        let hooks = mask(bits);
                        let id = bush.register(Box::new(Masked(hooks)), ClientHandle::detached());
                        model.push((id, hooks));
                        ever.push(id);
                    }
                    Op::Deregister(pick) => {
                        if ever.is_empty() {
                            continue;
                        }
                        let id = ever[pick % ever.len()];
                        let removed = bush.deregister(id).is_some();
                        let position = model.iter().position(|(known, _)| *known == id);
                        prop_assert_eq!(removed, position.is_some());
                        if let Some(position) = position {
                            model.remove(position);
                        }
                    }
                }

                for hook in Hook::ALL {
                    let expected: Vec<LeafId> = model
                        .iter()
                        .filter(|(_, hooks)| hooks.contains(hook))
                        .map(|(id, _)| *id)
                        .collect();
                    prop_assert_eq!(bush.active_branch(hook), expected);
                }
            }
        }

        #[test]
        fn prop_fold_applies_every_leaf_once_in_order(count in 0usize..8) {
            let log = Arc::new(Mutex::new(Vec::new()));
            let mut bush = Bush::new();
            let tags = ["a", "b", "c", "d", "e", "f", "g", "h"];

            for &tag in tags.iter().take(count) {
                bush.register(
                    Tagger::new(tag, HookSet::from(Hook::SupplementQuery), &log),
                    ClientHandle::detached(),
                );
            }

            let result = bush.supplement_query(query());
            let expected = tags[..count].join(",");

            if count == 0 {
                prop_assert!(result.data.get("trail").is_none());
            } else {
                prop_assert_eq!(result.data.get("trail"), Some(&Value::String(expected)));
            }
        }
    }
}
