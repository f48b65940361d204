//! Type-safe identifiers for client entities.
//!
//! Newtype wrappers prevent mixing incompatible counters at compile time.
//!
//! | Type | Identifies |
//! |------|------------|
//! | [`LeafId`] | A leaf registered on a client's bush |
//! | [`Generation`] | One transport instance (one socket) |
//! | [`Epoch`] | One user-initiated connect/reconnect/disconnect |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// LeafId
// ============================================================================

/// Identifier of a registered leaf.
///
/// Returned by [`Client::register_leaf`](crate::Client::register_leaf)
/// and used to deregister the leaf again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(u64);

impl LeafId {
    /// Creates a leaf id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "leaf#{}", self.0)
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Generation of a transport.
///
/// Every connect creates a new transport with the next generation; events
/// tagged with an older generation belong to a superseded socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    /// Returns the generation that follows this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Epoch
// ============================================================================

/// Epoch of user-initiated connection changes.
///
/// Bumped by every `connect`, `reconnect` and `disconnect`. A deferred
/// reconnect carries the epoch it was scheduled in and is dropped if the
/// epoch moved on in the meantime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epoch(u64);

impl Epoch {
    /// Creates an epoch from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
