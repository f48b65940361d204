//! Letter notifications.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tracing::trace;

use crate::leaf::{Hook, HookSet, Leaf};
use crate::protocol::{Letter, RenderLetterData};

// ============================================================================
// LetterEventsLeaf
// ============================================================================

/// Forwards every letter the server sends to a channel.
#[derive(Debug, Clone)]
pub struct LetterEventsLeaf {
    sender: mpsc::UnboundedSender<Letter>,
}

impl LetterEventsLeaf {
    /// Creates a leaf forwarding to `sender`.
    #[must_use]
    pub fn new(sender: mpsc::UnboundedSender<Letter>) -> Self {
        Self { sender }
    }

    /// Creates a leaf together with the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Letter>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Leaf for LetterEventsLeaf {
    fn hooks(&self) -> HookSet {
        HookSet::from(Hook::ProcessRenderLetterRequest)
    }

    fn process_render_letter_request(&mut self, data: &RenderLetterData) {
        if self.sender.send(data.letter.clone()).is_err() {
            trace!("Letter receiver dropped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
