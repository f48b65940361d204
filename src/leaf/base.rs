//! The leaf contract.

// ============================================================================
// Imports
// ============================================================================

use crate::client::ClientHandle;
use crate::protocol::{
    ClientHandshakeData, EventMessage, QueryMessage, RenderLetterData, ServerHandshakeData,
};

use super::hook::HookSet;

// ============================================================================
// Leaf
// ============================================================================

/// A plugin that reacts to client lifecycle events and layers data onto
/// outgoing messages.
///
/// Every hook has a no-op default. A leaf overrides the hooks it cares
/// about and lists them in [`Leaf::hooks`]; the bush never calls a hook
/// that is not listed, and captures the set once, at registration.
///
/// # Transform hooks
///
/// `supplement_*` hooks are folded across every leaf implementing them, in
/// registration order. Each leaf receives the original message and the
/// result of the previous leaf (the first leaf receives the message the
/// client built), and returns the message handed to the next leaf.
///
/// # Example
///
/// ```ignore
/// use botsocket_client::{Hook, HookSet, Leaf, QueryMessage};
/// use serde_json::json;
///
/// struct Locale;
///
/// impl Leaf for Locale {
///     fn hooks(&self) -> HookSet {
///         HookSet::from(Hook::SupplementQuery)
///     }
///
///     fn supplement_query(&mut self, _: &QueryMessage, mut query: QueryMessage) -> QueryMessage {
///         query.data.insert("locale", json!("en-NZ"));
///         query
///     }
/// }
/// ```
#[allow(unused_variables)]
pub trait Leaf: Send + 'static {
    /// Returns the hooks this leaf implements.
    fn hooks(&self) -> HookSet;

    /// Returns a name for log output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called when the leaf is registered on a client.
    ///
    /// `client` stays valid until [`Leaf::deregister`]; it does not keep
    /// the client alive.
    fn register(&mut self, client: ClientHandle) {}

    /// Called when the leaf is removed from its client.
    fn deregister(&mut self) {}

    // ========================================================================
    // Lifecycle Hooks
    // ========================================================================

    /// Called before a new socket is created.
    fn pre_connect(&mut self, is_reconnecting: bool) {}

    /// Called after the socket opened and the client handshake was sent.
    fn post_connect(&mut self) {}

    /// Called before the client closes its socket on purpose.
    fn pre_disconnect(&mut self, code: u16) {}

    /// Called after the socket closed.
    fn post_disconnect(&mut self, code: u16) {}

    /// Called when the socket reports an error.
    fn errored(&mut self) {}

    /// Called once the server handshake has been fully processed.
    fn post_handshake(&mut self) {}

    /// Called with the server's half of the handshake.
    fn process_server_handshake(&mut self, data: &ServerHandshakeData) {}

    /// Called with every letter the server sends.
    fn process_render_letter_request(&mut self, data: &RenderLetterData) {}

    // ========================================================================
    // Transform Hooks
    // ========================================================================

    /// Transforms the client's half of the handshake.
    fn supplement_client_handshake(
        &mut self,
        original: &ClientHandshakeData,
        previous: ClientHandshakeData,
    ) -> ClientHandshakeData {
        previous
    }

    /// Transforms an outgoing query.
    fn supplement_query(&mut self, original: &QueryMessage, previous: QueryMessage) -> QueryMessage {
        previous
    }

    /// Transforms an outgoing event.
    fn supplement_event(&mut self, original: &EventMessage, previous: EventMessage) -> EventMessage {
        previous
    }
}
