//! Wire envelope codec.
//!
//! Every frame exchanged with the BotSocket server is a JSON object with a
//! `request` discriminator and a `data` payload.
//!
//! # Format
//!
//! ```json
//! {
//!   "request": "submit-query",
//!   "data": { ... }
//! }
//! ```
//!
//! Outbound frames are built from an [`Envelope`]. Inbound frames are first
//! decoded into a [`RawEnvelope`] (any `request` string) and then classified
//! into an [`Inbound`] message; unknown request types are an error.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::message::{RenderLetterData, ServerHandshakeData};

// ============================================================================
// RequestKind
// ============================================================================

/// The `request` discriminator of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    /// Handshake, in both directions.
    Handshake,
    /// Query submitted by the client.
    SubmitQuery,
    /// Event submitted by the client.
    SubmitEvent,
    /// Letter to render, sent by the server.
    RenderLetter,
    /// Deprecated alias of [`RequestKind::RenderLetter`].
    RenderMessages,
}

impl RequestKind {
    /// All request kinds, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Handshake,
        Self::SubmitQuery,
        Self::SubmitEvent,
        Self::RenderLetter,
        Self::RenderMessages,
    ];

    /// Returns the wire name of this request.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::SubmitQuery => "submit-query",
            Self::SubmitEvent => "submit-event",
            Self::RenderLetter => "render-letter",
            Self::RenderMessages => "render-messages",
        }
    }

    /// Parses a wire name, returning `None` for unknown requests.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Returns `true` for render-letter and its deprecated alias.
    #[inline]
    #[must_use]
    pub const fn is_render_letter(self) -> bool {
        matches!(self, Self::RenderLetter | Self::RenderMessages)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// A typed envelope, as sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Request discriminator.
    pub request: RequestKind,
    /// Request payload.
    pub data: Value,
}

impl Envelope {
    /// Creates an envelope from an already serialized payload.
    #[inline]
    #[must_use]
    pub fn new(request: RequestKind, data: Value) -> Self {
        Self { request, data }
    }

    /// Creates an envelope by serializing `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `data` cannot be serialized.
    pub fn from_data<T: Serialize>(request: RequestKind, data: &T) -> Result<Self> {
        Ok(Self::new(request, serde_json::to_value(data)?))
    }

    /// Encodes this envelope into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// RawEnvelope
// ============================================================================

/// An inbound envelope whose `request` has not been checked yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEnvelope {
    /// Request discriminator, as sent by the server.
    pub request: String,
    /// Request payload.
    #[serde(default = "empty_object")]
    pub data: Value,
}

impl RawEnvelope {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the frame is not a JSON envelope.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Converts into a typed [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedRequestType`] for unknown requests.
    pub fn into_envelope(self) -> Result<Envelope> {
        let request = RequestKind::parse(&self.request)
            .ok_or_else(|| Error::unsupported_request_type(&self.request))?;

        Ok(Envelope::new(request, self.data))
    }

    /// Classifies this envelope into an inbound message.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedRequestType`] for unknown requests, and for
    ///   requests that only ever travel from client to server
    /// - [`Error::Protocol`] if the data does not match the request's shape
    pub fn classify(self) -> Result<Inbound> {
        let envelope = self.into_envelope()?;

        match envelope.request {
            RequestKind::Handshake => Ok(Inbound::ServerHandshake(from_data(
                envelope.request,
                envelope.data,
            )?)),
            RequestKind::RenderLetter | RequestKind::RenderMessages => {
                let data: RenderLetterData = from_data(envelope.request, envelope.data)?;
                Ok(Inbound::RenderLetter(data.normalized()))
            }
            RequestKind::SubmitQuery | RequestKind::SubmitEvent => {
                Err(Error::unsupported_request_type(envelope.request.as_str()))
            }
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The server's half of the handshake.
    ServerHandshake(ServerHandshakeData),
    /// A letter to render (`render-letter` or `render-messages`).
    RenderLetter(RenderLetterData),
}

impl Inbound {
    /// Returns the request kind this message was classified as.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::ServerHandshake(_) => RequestKind::Handshake,
            Self::RenderLetter(_) => RequestKind::RenderLetter,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Deserializes request data, reporting shape mismatches as protocol errors.
fn from_data<T: DeserializeOwned>(request: RequestKind, data: Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| Error::protocol(format!("invalid {request} data: {e}")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_request_kind_wire_names() {
        for kind in RequestKind::ALL {
            let json = serde_json::to_value(kind).expect("serialize");
            assert_eq!(json, Value::String(kind.as_str().to_string()));
            assert_eq!(RequestKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RequestKind::parse("render-cards"), None);
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = Envelope::new(
            RequestKind::SubmitQuery,
            json!({ "query": "hi", "text": "hi", "data": { "senderId": "u1" } }),
        );

        let text = envelope.encode().expect("encode");
        let decoded = RawEnvelope::decode(&text)
            .and_then(RawEnvelope::into_envelope)
            .expect("decode");

        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_decode_malformed() {
        assert!(RawEnvelope::decode("{not json").is_err());
        assert!(RawEnvelope::decode(r#"{"data": {}}"#).is_err());
    }

    #[test]
    fn test_decode_missing_data_defaults_to_object() {
        let raw = RawEnvelope::decode(r#"{"request": "handshake"}"#).expect("decode");
        assert_eq!(raw.data, json!({}));
    }

    #[test]
    fn test_classify_server_handshake() {
        let raw = RawEnvelope::decode(
            r#"{"request":"handshake","data":{"userId":"u1","retryWaitTime":2}}"#,
        )
        .expect("decode");

        match raw.classify().expect("classify") {
            Inbound::ServerHandshake(data) => {
                assert_eq!(data.user_id.as_deref(), Some("u1"));
                assert_eq!(data.retry_wait_time, Some(2));
            }
            other => panic!("unexpected inbound message: {other:?}"),
        }
    }

    #[test]
    fn test_classify_render_messages_alias() {
        let raw = RawEnvelope::decode(
            r#"{"request":"render-messages","data":{"messages":[{"type":"text","text":"hi"}]}}"#,
        )
        .expect("decode");

        let inbound = raw.classify().expect("classify");
        assert_eq!(inbound.kind(), RequestKind::RenderLetter);

        match inbound {
            Inbound::RenderLetter(data) => {
                assert_eq!(data.letter.len(), 1);
                assert_eq!(data.letter[0].text(), Some("hi"));
            }
            other => panic!("unexpected inbound message: {other:?}"),
        }
    }

    #[test]
    fn test_classify_unknown_request() {
        let raw = RawEnvelope::decode(r#"{"request":"render-cards","data":{}}"#).expect("decode");

        let err = raw.classify().unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedRequestType { ref request } if request == "render-cards"
        ));
    }

    #[test]
    fn test_classify_outbound_only_request() {
        let raw = RawEnvelope::decode(r#"{"request":"submit-query","data":{}}"#).expect("decode");
        assert!(matches!(
            raw.classify(),
            Err(Error::UnsupportedRequestType { .. })
        ));
    }

    #[test]
    fn test_classify_bad_shape() {
        let raw = RawEnvelope::decode(r#"{"request":"render-letter","data":{"letter":"nope"}}"#)
            .expect("decode");
        assert!(matches!(raw.classify(), Err(Error::Protocol { .. })));
    }
}
