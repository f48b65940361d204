//! Leaf plugin model.
//!
//! Leaves extend a [`Client`](crate::Client) without subclassing it. Each
//! leaf implements any subset of the hooks of the [`Leaf`] trait and is
//! registered on the client's [`Bush`], which dispatches lifecycle hooks
//! and folds transform hooks across every leaf that implements them.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Leaf`] | The plugin contract |
//! | [`Hook`] | One extension point |
//! | [`HookSet`] | Hooks a leaf implements |
//! | [`Bush`] | Ordered registry and dispatcher |
//!
//! # Ordering
//!
//! Registration order is reduction order. A leaf that needs to see what
//! another leaf contributed must be registered after it.

// ============================================================================
// Submodules
// ============================================================================

/// The leaf contract.
pub mod base;

/// Leaf registry and reduction engine.
pub mod bush;

/// Hook identifiers and capability sets.
pub mod hook;

// ============================================================================
// Re-exports
// ============================================================================

pub use base::Leaf;
pub use bush::Bush;
pub use hook::{Hook, HookSet};
