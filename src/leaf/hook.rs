//! Hook identifiers and capability sets.
//!
//! Every extension point of [`Leaf`](super::Leaf) has a [`Hook`]. A leaf
//! declares the hooks it implements as a [`HookSet`]; the bush only calls a
//! leaf for hooks in its set.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Hook
// ============================================================================

/// An extension point of the leaf contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Hook {
    /// Before a socket is created.
    PreConnect = 0,
    /// After the socket opened and the client handshake was sent.
    PostConnect = 1,
    /// Before the socket is closed on purpose.
    PreDisconnect = 2,
    /// After the socket closed.
    PostDisconnect = 3,
    /// The socket reported an error.
    Errored = 4,
    /// After the server handshake was processed.
    PostHandshake = 5,
    /// The server handshake arrived.
    ProcessServerHandshake = 6,
    /// A letter arrived.
    ProcessRenderLetterRequest = 7,
    /// Transforms the outgoing client handshake.
    SupplementClientHandshake = 8,
    /// Transforms an outgoing query.
    SupplementQuery = 9,
    /// Transforms an outgoing event.
    SupplementEvent = 10,
}

impl Hook {
    /// All hooks, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::PreConnect,
        Self::PostConnect,
        Self::PreDisconnect,
        Self::PostDisconnect,
        Self::Errored,
        Self::PostHandshake,
        Self::ProcessServerHandshake,
        Self::ProcessRenderLetterRequest,
        Self::SupplementClientHandshake,
        Self::SupplementQuery,
        Self::SupplementEvent,
    ];

    /// Returns the name of the hook method.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PreConnect => "pre_connect",
            Self::PostConnect => "post_connect",
            Self::PreDisconnect => "pre_disconnect",
            Self::PostDisconnect => "post_disconnect",
            Self::Errored => "errored",
            Self::PostHandshake => "post_handshake",
            Self::ProcessServerHandshake => "process_server_handshake",
            Self::ProcessRenderLetterRequest => "process_render_letter_request",
            Self::SupplementClientHandshake => "supplement_client_handshake",
            Self::SupplementQuery => "supplement_query",
            Self::SupplementEvent => "supplement_event",
        }
    }

    /// Returns `true` for hooks that transform and return a message.
    #[inline]
    #[must_use]
    pub const fn is_transform(self) -> bool {
        matches!(
            self,
            Self::SupplementClientHandshake | Self::SupplementQuery | Self::SupplementEvent
        )
    }

    #[inline]
    const fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// HookSet
// ============================================================================

/// A set of hooks, stored as a bitmask.
///
/// # Example
///
/// ```ignore
/// use botsocket_client::{Hook, HookSet};
///
/// let hooks = HookSet::EMPTY
///     .with(Hook::SupplementQuery)
///     .with(Hook::SupplementEvent);
///
/// assert!(hooks.contains(Hook::SupplementQuery));
/// assert!(!hooks.contains(Hook::PreConnect));
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct HookSet(u16);

impl HookSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Returns the set of every hook.
    #[must_use]
    pub const fn all() -> Self {
        let mut set = Self::EMPTY;
        let mut index = 0;
        while index < Hook::ALL.len() {
            set = set.with(Hook::ALL[index]);
            index += 1;
        }
        set
    }

    /// Returns this set with `hook` added.
    #[inline]
    #[must_use]
    pub const fn with(self, hook: Hook) -> Self {
        Self(self.0 | hook.bit())
    }

    /// Returns this set with `hook` removed.
    #[inline]
    #[must_use]
    pub const fn without(self, hook: Hook) -> Self {
        Self(self.0 & !hook.bit())
    }

    /// Returns the union of both sets.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if `hook` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, hook: Hook) -> bool {
        self.0 & hook.bit() != 0
    }

    /// Returns `true` if the set is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the number of hooks in the set.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the hooks in the set, in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Hook> {
        Hook::ALL.into_iter().filter(move |hook| self.contains(*hook))
    }
}

impl FromIterator<Hook> for HookSet {
    fn from_iter<I: IntoIterator<Item = Hook>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl From<Hook> for HookSet {
    #[inline]
    fn from(hook: Hook) -> Self {
        Self::EMPTY.with(hook)
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
