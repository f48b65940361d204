//! Timezone stamping.

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};
use crate::leaf::{Hook, HookSet, Leaf};
use crate::protocol::{ClientHandshakeData, EventMessage, QueryMessage};

// ============================================================================
// TimezoneLeaf
// ============================================================================

/// Stamps a timezone onto handshakes, queries and events.
///
/// Leaves registered after this one see the stamped timezone and may
/// replace it again. An unset timezone leaves messages untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimezoneLeaf {
    timezone: Option<String>,
}

impl TimezoneLeaf {
    /// Creates a leaf stamping `timezone`.
    #[must_use]
    pub fn new(timezone: impl Into<String>) -> Self {
        Self {
            timezone: Some(timezone.into()),
        }
    }

    /// Returns the timezone.
    #[inline]
    #[must_use]
    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    /// Replaces the timezone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `timezone` is empty.
    pub fn set_timezone(&mut self, timezone: impl Into<String>) -> Result<()> {
        let timezone = timezone.into();
        if timezone.is_empty() {
            return Err(Error::invalid_argument("timezone must not be empty"));
        }

        self.timezone = Some(timezone);
        Ok(())
    }

    /// Stops stamping.
    pub fn clear(&mut self) {
        self.timezone = None;
    }

    fn stamp(&self, slot: &mut Option<String>) {
        if let Some(timezone) = &self.timezone {
            *slot = Some(timezone.clone());
        }
    }
}

impl Leaf for TimezoneLeaf {
    fn hooks(&self) -> HookSet {
        [
            Hook::SupplementClientHandshake,
            Hook::SupplementQuery,
            Hook::SupplementEvent,
        ]
        .into_iter()
        .collect()
    }

    fn supplement_client_handshake(
        &mut self,
        _original: &ClientHandshakeData,
        mut previous: ClientHandshakeData,
    ) -> ClientHandshakeData {
        self.stamp(&mut previous.timezone);
        previous
    }

    fn supplement_query(&mut self, _original: &QueryMessage, mut previous: QueryMessage) -> QueryMessage {
        self.stamp(&mut previous.timezone);
        previous
    }

    fn supplement_event(&mut self, _original: &EventMessage, mut previous: EventMessage) -> EventMessage {
        self.stamp(&mut previous.timezone);
        previous
    }
}

// ============================================================================
// Tests
// ============================================================================
