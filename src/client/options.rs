//! Session options.
//!
//! Options seed the client's session identity and the fields the client
//! stamps onto its handshake and messages.
//!
//! # Example
//!
//! ```ignore
//! use botsocket_client::SessionOptions;
//!
//! let options = SessionOptions::new()
//!     .with_user_id("u1")
//!     .with_timezone("Pacific/Auckland")
//!     .with_support("render-letter");
//! ```

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Seconds to wait before reconnecting when the server never said otherwise.
pub const DEFAULT_RETRY_WAIT_TIME: u64 = 1;

// ============================================================================
// SessionOptions
// ============================================================================

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Identity to resume. Empty lets the server assign one.
    pub user_id: String,

    /// IANA timezone stamped on the handshake and every message.
    pub timezone: Option<String>,

    /// Capabilities advertised in the handshake.
    pub supports: Vec<String>,

    /// Seconds to wait before reconnecting, until the server says otherwise.
    pub retry_wait_time: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionOptions {
    /// Creates options with no identity and no timezone.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            user_id: String::new(),
            timezone: None,
            supports: Vec::new(),
            retry_wait_time: DEFAULT_RETRY_WAIT_TIME,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionOptions {
    /// Sets the identity to resume.
    #[inline]
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Sets the timezone.
    #[inline]
    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Adds an advertised capability.
    #[inline]
    #[must_use]
    pub fn with_support(mut self, capability: impl Into<String>) -> Self {
        self.supports.push(capability.into());
        self
    }

    /// Adds several advertised capabilities.
    #[inline]
    #[must_use]
    pub fn with_supports(mut self, capabilities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.supports
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Sets the initial reconnect wait, in seconds.
    #[inline]
    #[must_use]
    pub fn with_retry_wait_time(mut self, seconds: u64) -> Self {
        self.retry_wait_time = seconds;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionOptions {
    /// Checks that every set string is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty timezone or
    /// capability.
    pub fn validate(&self) -> Result<()> {
        if self.timezone.as_deref().is_some_and(str::is_empty) {
            return Err(Error::invalid_argument("timezone must not be empty"));
        }

        if self.supports.iter().any(String::is_empty) {
            return Err(Error::invalid_argument("capabilities must not be empty"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
