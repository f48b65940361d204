//! Letter rendering through `tracing`.
//!
//! [`TracingRendererLeaf`] logs every message of every letter at `INFO`,
//! with a short human description ("started typing", ": hello", "sent an
//! image"). Given a [`SharedArchive`] it also replays the archived letters
//! once the session is ready, so a restarted client shows the conversation
//! so far.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::fmt;

use tracing::{info, warn};

use crate::leaf::{Hook, HookSet, Leaf};
use crate::protocol::{Message, RenderLetterData, RequestKind};

use super::archiver::SharedArchive;

// ============================================================================
// Sugar
// ============================================================================

/// Describes a message the way a chat transcript would.
#[must_use]
pub fn message_sugar(message: &Message) -> Cow<'_, str> {
    match message.kind.as_str() {
        "typing" => {
            if message.get_str("state") == Some("on") {
                Cow::Borrowed("started typing")
            } else {
                Cow::Borrowed("stopped typing")
            }
        }
        "text" => Cow::Owned(format!(": {}", message.text().unwrap_or_default())),
        "image" => Cow::Borrowed("sent an image"),
        "card" => Cow::Borrowed("sent a card"),
        _ => Cow::Borrowed("sent a message"),
    }
}

// ============================================================================
// TracingRendererLeaf
// ============================================================================

/// Renders letters as log lines.
#[derive(Default)]
pub struct TracingRendererLeaf {
    archive: Option<SharedArchive>,
    rendered: u64,
}

impl TracingRendererLeaf {
    /// Creates a renderer without replay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays letters from `archive` after each handshake.
    #[must_use]
    pub fn with_archive(mut self, archive: SharedArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Returns the number of messages rendered so far.
    #[inline]
    #[must_use]
    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    fn render(&mut self, data: &RenderLetterData) {
        for message in &data.letter {
            info!(
                from = message.sender_class().as_str(),
                kind = %message.kind,
                "{}",
                message_sugar(message)
            );
            self.rendered += 1;
        }
    }

    fn replay(&mut self) {
        let Some(archive) = &self.archive else {
            return;
        };

        let letters = archive.lock().requests_of(&[RequestKind::RenderLetter]);

        for envelope in letters {
            match serde_json::from_value::<RenderLetterData>(envelope.data) {
                Ok(data) => self.render(&data.normalized()),
                Err(e) => warn!(error = %e, "Skipping unreadable archived letter"),
            }
        }
    }
}

impl fmt::Debug for TracingRendererLeaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingRendererLeaf")
            .field("replays", &self.archive.is_some())
            .field("rendered", &self.rendered)
            .finish()
    }
}

impl Leaf for TracingRendererLeaf {
    fn hooks(&self) -> HookSet {
        HookSet::from(Hook::PostHandshake).with(Hook::ProcessRenderLetterRequest)
    }

    fn post_handshake(&mut self) {
        self.replay();
    }

    fn process_render_letter_request(&mut self, data: &RenderLetterData) {
        self.render(data);
    }
}

// ============================================================================
// Tests
// ============================================================================
