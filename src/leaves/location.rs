//! Geolocation stamping.
//!
//! [`LocationLeaf`] adds the client's position to the `data` of queries and
//! events as `location: { lat, lng }`. The position comes from a
//! [`LocationProvider`]; nothing is added while it is unknown.
//!
//! | Provider | Position |
//! |----------|----------|
//! | [`StaticLocation`] | Set by hand |
//! | [`WatchedLocation`] | Latest value of a `tokio::sync::watch` channel |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tokio::sync::watch;

use crate::leaf::{Hook, HookSet, Leaf};
use crate::protocol::{EventMessage, LatLng, MessageData, QueryMessage};

// ============================================================================
// LocationProvider
// ============================================================================

/// Source of the client's position.
pub trait LocationProvider: Send + 'static {
    /// Returns the current position, if known.
    fn location(&self) -> Option<LatLng>;
}

/// A position set by hand.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StaticLocation(Option<LatLng>);

impl StaticLocation {
    /// Creates a provider at `lat`, `lng`.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self(Some(LatLng::new(lat, lng)))
    }

    /// Creates a provider without a position.
    #[must_use]
    pub const fn unknown() -> Self {
        Self(None)
    }

    /// Moves the position.
    pub fn set(&mut self, location: Option<LatLng>) {
        self.0 = location;
    }
}

impl LocationProvider for StaticLocation {
    fn location(&self) -> Option<LatLng> {
        self.0
    }
}

/// A position fed through a watch channel, e.g. by a GPS task.
#[derive(Debug, Clone)]
pub struct WatchedLocation {
    rx: watch::Receiver<Option<LatLng>>,
}

impl WatchedLocation {
    /// Creates a provider reading from `rx`.
    #[must_use]
    pub fn new(rx: watch::Receiver<Option<LatLng>>) -> Self {
        Self { rx }
    }

    /// Creates a provider together with the sender that moves it.
    #[must_use]
    pub fn channel() -> (watch::Sender<Option<LatLng>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self::new(rx))
    }
}

impl LocationProvider for WatchedLocation {
    fn location(&self) -> Option<LatLng> {
        *self.rx.borrow()
    }
}

// ============================================================================
// LocationLeaf
// ============================================================================

/// Adds `data.location` to queries and events.
#[derive(Debug, Clone)]
pub struct LocationLeaf<P> {
    provider: P,
}

impl<P: LocationProvider> LocationLeaf<P> {
    /// Creates a leaf reading positions from `provider`.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Returns the provider.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the provider for updating.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    fn stamp(&self, data: &mut MessageData) {
        let Some(LatLng { lat, lng }) = self.provider.location() else {
            return;
        };

        data.insert("location", serde_json::json!({ "lat": lat, "lng": lng }));
    }
}

impl<P: LocationProvider> Leaf for LocationLeaf<P> {
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

/// Reads `data.location` back from a message.
#[must_use]
pub fn location_of(data: &MessageData) -> Option<LatLng> {
    data.get("location")
        .cloned()
        .and_then(|value: Value| serde_json::from_value(value).ok())
}

// ============================================================================
// Tests
// ============================================================================
