//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and creating [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use botsocket_client::Client;
//! use botsocket_client::leaves::AutoReconnectLeaf;
//!
//! # fn example() -> botsocket_client::Result<()> {
//! let client = Client::builder()
//!     .url("wss://bots.example.com/socket")
//!     .user_id("u1")
//!     .timezone("Pacific/Auckland")
//!     .leaf(AutoReconnectLeaf::new())
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};
use crate::leaf::Leaf;
use crate::transport::{Connector, WebSocketConnector};

use super::core::Client;
use super::options::SessionOptions;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Default)]
pub struct ClientBuilder {
    /// Server endpoint.
    url: Option<String>,
    /// Session options.
    options: SessionOptions,
    /// Transport factory; WebSocket when unset.
    connector: Option<Box<dyn Connector>>,
    /// Leaves to register, in order.
    leaves: Vec<Box<dyn Leaf>>,
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a new client builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - `ws://` or `wss://` URL of the BotSocket server
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Replaces the session options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the identity to resume.
    #[inline]
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.options.user_id = user_id.into();
        self
    }

    /// Sets the timezone.
    #[inline]
    #[must_use]
    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.options.timezone = Some(timezone.into());
        self
    }

    /// Adds advertised capabilities.
    #[inline]
    #[must_use]
    pub fn supports(mut self, capabilities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options
            .supports
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Sets the transport factory.
    ///
    /// Defaults to [`WebSocketConnector`].
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    /// Adds a leaf. Leaves are registered in the order they are added.
    #[inline]
    #[must_use]
    pub fn leaf(mut self, leaf: impl Leaf) -> Self {
        self.leaves.push(Box::new(leaf));
        self
    }

    /// Builds the client with validation.
    ///
    /// Leaves added to the builder are registered on the new client.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the URL is missing or not `ws`/`wss`
    /// - [`Error::Url`] if the URL cannot be parsed
    /// - [`Error::InvalidArgument`] if the options contain empty strings
    pub fn build(self) -> Result<Client> {
        let url = self.validate_url()?;
        self.options.validate()?;

        let connector = self
            .connector
            .unwrap_or_else(|| Box::new(WebSocketConnector::new()));

        let mut client = Client::new(url, self.options, connector);
        for leaf in self.leaves {
            client.register_boxed_leaf(leaf);
        }

        Ok(client)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the endpoint configuration.
    fn validate_url(&self) -> Result<Url> {
        let raw = self.url.as_deref().ok_or_else(|| {
            Error::config(
                "Server URL is required. Use .url() to set it.\n\
                 Example: Client::builder().url(\"wss://bots.example.com/socket\")",
            )
        })?;

        let url = Url::parse(raw)?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(Error::config(format!(
                "Unsupported URL scheme '{scheme}' in {url}\n\
                 BotSocket servers are reached over ws:// or wss://."
            ))),
        }
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("url", &self.url)
            .field("options", &self.options)
            .field("connector", &self.connector.is_some())
            .field("leaves", &self.leaves.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
