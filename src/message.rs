//! Finalized application message types exposed to consumers.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Closed set of application message types.
///
/// Senders put free-form strings on the wire; anything outside the known
/// set maps to `Custom` rather than failing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageType {
    Chat,
    Action,
    Event,
    Data,
    Custom,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Chat => "chat",
            MessageType::Action => "action",
            MessageType::Event => "event",
            MessageType::Data => "data",
            MessageType::Custom => "custom",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "chat" => MessageType::Chat,
            "action" => MessageType::Action,
            "event" => MessageType::Event,
            "data" => MessageType::Data,
            _ => MessageType::Custom,
        }
    }

    /// Strict variant of [`parse`](Self::parse) for request validation:
    /// only accepts members of the closed set, including "custom" itself.
    pub fn parse_strict(raw: &str) -> Option<Self> {
        match raw {
            "chat" => Some(MessageType::Chat),
            "action" => Some(MessageType::Action),
            "event" => Some(MessageType::Event),
            "data" => Some(MessageType::Data),
            "custom" => Some(MessageType::Custom),
            _ => None,
        }
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(MessageType::parse(&raw))
    }
}

/// A finalized application message.
///
/// Created by the finality tracker at the moment its carrying transaction
/// appears in a checkpoint, and immutable thereafter. `finalized` is always
/// true on construction; the field exists so consumers see the guarantee
/// explicitly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub content: JsonValue,
    pub transaction_id: String,
    pub finalized: bool,
}

impl ApplicationMessage {
    /// Build a message from a transaction's decoded payload.
    ///
    /// When the payload is an object carrying the sender-side envelope
    /// fields (`id`, `timestamp`, `sender`, `type`, `channel`, `content`),
    /// those are lifted; otherwise the whole payload becomes the content.
    /// Missing `id` gets a fresh UUID, missing `timestamp` the arrival time.
    pub fn from_content(transaction_id: &str, payload: JsonValue) -> Self {
        let now = Utc::now();

        let Some(obj) = payload.as_object() else {
            return Self {
                id: Uuid::new_v4().to_string(),
                timestamp: now,
                sender: None,
                message_type: MessageType::Custom,
                channel: None,
                content: payload,
                transaction_id: transaction_id.to_string(),
                finalized: true,
            };
        };

        let id = obj
            .get("id")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let timestamp = obj
            .get("timestamp")
            .and_then(parse_timestamp)
            .unwrap_or(now);

        let sender = obj
            .get("sender")
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        let message_type = obj
            .get("type")
            .and_then(JsonValue::as_str)
            .map(MessageType::parse)
            .unwrap_or(MessageType::Custom);

        let channel = obj
            .get("channel")
            .and_then(JsonValue::as_str)
            .map(str::to_string);

        let content = obj.get("content").cloned().unwrap_or(payload.clone());

        Self {
            id,
            timestamp,
            sender,
            message_type,
            channel,
            content,
            transaction_id: transaction_id.to_string(),
            finalized: true,
        }
    }
}

/// Accept either Unix milliseconds or an RFC 3339 string
fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    if let Some(ms) = value.as_i64() {
        return Utc.timestamp_millis_opt(ms).single();
    }
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
