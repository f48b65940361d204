//! Message shapes carried inside envelopes.
//!
//! | Type | Request | Direction |
//! |------|---------|-----------|
//! | [`ClientHandshakeData`] | `handshake` | Client → Server |
//! | [`ServerHandshakeData`] | `handshake` | Server → Client |
//! | [`QueryMessage`] | `submit-query` | Client → Server |
//! | [`EventMessage`] | `submit-event` | Client → Server |
//! | [`RenderLetterData`] | `render-letter` | Server → Client |
//!
//! Every shape keeps unknown fields in a flattened `extra` map, so leaves
//! can layer arbitrary data onto outgoing messages and nothing the server
//! adds is lost on the way in.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

// ============================================================================
// ClientHandshakeData
// ============================================================================

/// Data of the client's `handshake` envelope.
///
/// # Format
///
/// ```json
/// {
///   "userId": "u1",
///   "timezone": "Pacific/Auckland",
///   "supports": ["render-letter"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientHandshakeData {
    /// Identity the client wants to resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Deprecated in favour of `user_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// IANA timezone of the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Capabilities advertised to the server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supports: Vec<String>,

    /// Additional fields contributed by leaves.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// ServerHandshakeData
// ============================================================================

/// Data of the server's `handshake` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHandshakeData {
    /// Identity assigned by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Deprecated in favour of `user_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Seconds to wait before reconnecting after an unexpected disconnect.
    ///
    /// Fractions round up to whole seconds. Negative, non-finite and
    /// non-numeric values read as absent.
    #[serde(
        default,
        deserialize_with = "lenient_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub retry_wait_time: Option<u64>,

    /// Server-side id of this connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,

    /// Unrecognized fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerHandshakeData {
    /// Returns the identity declared by the server.
    ///
    /// Falls back to the deprecated `clientId` when `userId` is absent or
    /// empty.
    #[must_use]
    pub fn declared_user_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.client_id.as_deref().filter(|id| !id.is_empty()))
    }
}

// ============================================================================
// MessageData
// ============================================================================

/// The `data` object of queries and events.
///
/// `senderId` is mandatory on the wire; everything else is free-form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    /// Identity the message is sent on behalf of.
    #[serde(default)]
    pub sender_id: String,

    /// Additional fields contributed by the caller or by leaves.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageData {
    /// Creates data for the given sender.
    #[inline]
    #[must_use]
    pub fn new(sender_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            extra: Map::new(),
        }
    }

    /// Builds data from a JSON value.
    ///
    /// Object fields become `extra` fields, except `senderId` which fills
    /// [`MessageData::sender_id`]. Non-object values are ignored.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let mut data = Self::default();

        if let Value::Object(map) = value {
            for (key, value) in map {
                data.insert(key, value);
            }
        }

        data
    }

    /// Inserts a field, routing `senderId` to its typed slot.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();

        if key == "senderId" {
            match value {
                Value::String(sender_id) => self.sender_id = sender_id,
                Value::Number(number) => self.sender_id = number.to_string(),
                other => debug!(value = %other, "Discarding non-scalar senderId"),
            }
            return;
        }

        self.extra.insert(key, value);
    }

    /// Merges all fields of `other` over this data.
    pub fn merge(&mut self, other: MessageData) {
        if !other.sender_id.is_empty() {
            self.sender_id = other.sender_id;
        }
        self.extra.extend(other.extra);
    }

    /// Gets an extra field.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Returns `true` if a sender is set.
    #[inline]
    #[must_use]
    pub fn has_sender(&self) -> bool {
        !self.sender_id.is_empty()
    }
}

// ============================================================================
// QueryMessage
// ============================================================================

/// A StaMP query message, sent with `submit-query`.
///
/// # Format
///
/// ```json
/// {
///   "$StaMP": true,
///   "type": "query",
///   "from": "user",
///   "query": "hello",
///   "text": "hello",
///   "data": { "senderId": "u1" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMessage {
    /// StaMP marker.
    #[serde(rename = "$StaMP", default)]
    pub stamp: bool,

    /// Message type (always `query`).
    #[serde(rename = "type")]
    pub kind: String,

    /// Sender classification (always `user`).
    pub from: String,

    /// The query to process.
    pub query: String,

    /// Human readable text of the query.
    pub text: String,

    /// Sender and supplemental data.
    pub data: MessageData,

    /// Timezone of the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Additional fields contributed by leaves.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QueryMessage {
    /// Creates a query message.
    ///
    /// `text` defaults to `query` when `None`.
    #[must_use]
    pub fn new(query: impl Into<String>, text: Option<String>, data: MessageData) -> Self {
        let query = query.into();
        let text = text.unwrap_or_else(|| query.clone());

        Self {
            stamp: true,
            kind: "query".to_string(),
            from: "user".to_string(),
            query,
            text,
            data,
            timezone: None,
            extra: Map::new(),
        }
    }
}

// ============================================================================
// EventMessage
// ============================================================================

/// A StaMP event message, sent with `submit-event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    /// StaMP marker.
    #[serde(rename = "$StaMP", default)]
    pub stamp: bool,

    /// Message type (always `event`).
    #[serde(rename = "type")]
    pub kind: String,

    /// Sender classification (always `user`).
    pub from: String,

    /// Name of the event.
    pub event: String,

    /// Event payload.
    #[serde(default = "empty_object")]
    pub payload: Value,

    /// Sender and supplemental data.
    pub data: MessageData,

    /// Timezone of the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    /// Additional fields contributed by leaves.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventMessage {
    /// Creates an event message.
    ///
    /// `payload` defaults to an empty object when `None`.
    #[must_use]
    pub fn new(event: impl Into<String>, payload: Option<Value>, data: MessageData) -> Self {
        Self {
            stamp: true,
            kind: "event".to_string(),
            from: "user".to_string(),
            event: event.into(),
            payload: payload.unwrap_or_else(empty_object),
            data,
            timezone: None,
            extra: Map::new(),
        }
    }
}

// ============================================================================
// Letter & Message
// ============================================================================

/// A collection of rendered conversational messages.
pub type Letter = Vec<Message>;

/// A single StaMP message inside a letter.
///
/// Only `type` and `from` are interpreted; everything else is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message type (`text`, `typing`, `image`, `card`, ...).
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Sender descriptor, `classification:tag:server`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Remaining message fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Message {
    /// Returns who sent this message.
    #[must_use]
    pub fn sender_class(&self) -> SenderClass {
        match self.from.as_deref().and_then(|from| from.split(':').next()) {
            Some("user") => SenderClass::User,
            _ => SenderClass::Server,
        }
    }

    /// Returns the `text` field, if any.
    #[inline]
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.fields.get("text").and_then(|v| v.as_str())
    }

    /// Gets a string field.
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }
}

/// Classification of a message's sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenderClass {
    /// Sent by (or on behalf of) the user.
    User,
    /// Sent by the server or a bot.
    Server,
}

impl SenderClass {
    /// Returns the classification name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Server => "server",
        }
    }
}

// ============================================================================
// RenderLetterData
// ============================================================================

/// Data of a `render-letter` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderLetterData {
    /// Messages to render.
    #[serde(default)]
    pub letter: Letter,

    /// Deprecated alias of `letter`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Letter>,
}

impl RenderLetterData {
    /// Creates render data for a letter.
    #[inline]
    #[must_use]
    pub fn new(letter: Letter) -> Self {
        Self {
            letter,
            messages: None,
        }
    }

    /// Moves the deprecated `messages` into `letter` when `letter` is empty.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.letter.is_empty()
            && let Some(messages) = self.messages.take()
        {
            self.letter = messages;
        }
        self
    }
}

// ============================================================================
// LatLng
// ============================================================================

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl LatLng {
    /// Creates a position.
    #[inline]
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Reads a seconds count from any JSON number.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;

    let seconds = match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => match number.as_u64() {
            Some(seconds) => Some(seconds),
            None => number
                .as_f64()
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .map(|seconds| seconds.ceil() as u64),
        },
        Some(other) => {
            debug!(value = %other, "Ignoring non-numeric retryWaitTime");
            None
        }
    };

    Ok(seconds)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_query_message_serialization() {
        let query = QueryMessage::new("hello", None, MessageData::new("u1"));
        let json = serde_json::to_value(&query).expect("serialize");

        assert_eq!(
            json,
            json!({
                "$StaMP": true,
                "type": "query",
                "from": "user",
                "query": "hello",
                "text": "hello",
                "data": { "senderId": "u1" }
            })
        );
    }

    #[test]
    fn test_event_message_defaults() {
        let event = EventMessage::new("welcome", None, MessageData::new("u1"));
        assert_eq!(event.payload, json!({}));
        assert_eq!(event.kind, "event");
    }

    #[test]
    fn test_message_data_from_value() {
        let data = MessageData::from_value(json!({ "senderId": "u2", "context": "billing" }));
        assert_eq!(data.sender_id, "u2");
        assert_eq!(data.get("context"), Some(&json!("billing")));
        assert!(data.get("senderId").is_none());
    }

    #[test]
    fn test_message_data_merge_keeps_sender_when_other_empty() {
        let mut data = MessageData::new("u1");
        data.merge(MessageData::from_value(json!({ "lang": "en" })));
        assert_eq!(data.sender_id, "u1");
        assert_eq!(data.get("lang"), Some(&json!("en")));
    }

    #[test]
    fn test_client_handshake_skips_empty_fields() {
        let handshake = ClientHandshakeData {
            user_id: Some("u1".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&handshake).expect("serialize");
        assert_eq!(json, json!({ "userId": "u1" }));
    }

    #[test]
    fn test_server_handshake_declared_user_id() {
        let data: ServerHandshakeData =
            serde_json::from_value(json!({ "userId": "", "clientId": "legacy" }))
                .expect("parse");
        assert_eq!(data.declared_user_id(), Some("legacy"));

        let data: ServerHandshakeData =
            serde_json::from_value(json!({ "userId": "u1", "clientId": "legacy" }))
                .expect("parse");
        assert_eq!(data.declared_user_id(), Some("u1"));
    }

    #[test]
    fn test_server_handshake_retry_wait_time_is_lenient() {
        let parse = |retry: Value| -> Option<u64> {
            serde_json::from_value::<ServerHandshakeData>(json!({ "retryWaitTime": retry }))
                .expect("parse")
                .retry_wait_time
        };

        assert_eq!(parse(json!(3)), Some(3));
        assert_eq!(parse(json!(1.5)), Some(2));
        assert_eq!(parse(json!(0.0)), Some(0));
        assert_eq!(parse(json!(-1)), None);
        assert_eq!(parse(json!(-0.5)), None);
        assert_eq!(parse(json!("soon")), None);
        assert_eq!(parse(Value::Null), None);

        let data: ServerHandshakeData = serde_json::from_value(json!({})).expect("parse");
        assert_eq!(data.retry_wait_time, None);
    }

    #[test]
    fn test_message_data_numeric_sender_id() {
        let data = MessageData::from_value(json!({ "senderId": 42 }));
        assert_eq!(data.sender_id, "42");

        let data = MessageData::from_value(json!({ "senderId": { "id": 1 } }));
        assert!(!data.has_sender());
        assert!(data.get("senderId").is_none());
    }

    #[test]
    fn test_sender_class() {
        let from_user = Message {
            kind: "text".into(),
            from: Some("user:abc:server-1".into()),
            fields: Map::new(),
        };
        let from_bot = Message {
            kind: "text".into(),
            from: Some("bot:abc".into()),
            fields: Map::new(),
        };

        assert_eq!(from_user.sender_class(), SenderClass::User);
        assert_eq!(from_bot.sender_class(), SenderClass::Server);
        assert_eq!(Message::default().sender_class(), SenderClass::Server);
    }

    #[test]
    fn test_render_letter_normalized() {
        let data: RenderLetterData = serde_json::from_value(json!({
            "messages": [{ "type": "text", "text": "hi" }]
        }))
        .expect("parse");

        let data = data.normalized();
        assert_eq!(data.letter.len(), 1);
        assert!(data.messages.is_none());
    }
}
