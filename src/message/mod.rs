//! Task event wire envelope.

mod types;

pub use types::{ControlAction, MessageType, UnknownMessageType};

use serde::{de, Deserialize, Deserializer, Serialize};
use snafu::prelude::*;

/// Error when parse frame text as an envelope
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ParseMessageError {
    /// binary frame payload is not utf-8
    #[snafu(display("frame payload is not utf-8: {source}"))]
    NotUtf8 {
        /// source error
        source: std::string::FromUtf8Error,
    },

    /// data is invalid json
    #[snafu(display("parse json failed: {source}"))]
    ParseJSONFailed {
        /// source error
        source: serde_json::Error,
    },

    /// data json is not an object
    #[snafu(display("parsed message is not object: {json}"))]
    MessageNotObject {
        /// json string
        json: String,
    },

    /// data json has no type field
    #[snafu(display("message has no type field: {json}"))]
    NoMessageType {
        /// json string
        json: String,
    },

    /// data json type field is not a string
    #[snafu(display("message has non-string type field: {json}"))]
    MessageTypeNotString {
        /// json string
        json: String,
    },

    /// data json is not a valid envelope
    #[snafu(display("parse to {type_name} envelope failed: {source}"))]
    ParseJSONToEnvelopeFailed {
        /// type name
        type_name: String,
        /// source error
        source: serde_json::Error,
    },
}

/// Envelope of every message in both directions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// message type
    pub r#type: MessageType,
    /// task this message belongs to
    #[serde(default)]
    pub task_id: String,
    /// epoch millis, fractional part dropped on decode
    #[serde(default, deserialize_with = "timestamp_millis")]
    pub timestamp: i64,
    /// type specific payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

fn timestamp_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;

    number
        .as_i64()
        .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
        .ok_or_else(|| de::Error::custom(format!("timestamp {} out of range", number)))
}

/// Result of decoding an inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// a message with a known type
    Known(Envelope),
    /// well formed, but type is not one we handle
    Unknown {
        /// received type string
        type_name: String,
    },
}

impl Envelope {
    /// Decode frame text to an envelope
    pub fn decode(text: &str) -> Result<Inbound, ParseMessageError> {
        let value: serde_json::Value = serde_json::from_str(text).context(error::ParseJSONFailed)?;

        let obj = value
            .as_object()
            .with_context(|| error::MessageNotObject { json: text })?;

        let type_name = obj
            .get("type")
            .with_context(|| error::NoMessageType { json: text })?
            .as_str()
            .with_context(|| error::MessageTypeNotString { json: text })?;

        if type_name.parse::<MessageType>().is_err() {
            return Ok(Inbound::Unknown {
                type_name: type_name.to_string(),
            });
        }

        let type_name = type_name.to_string();
        serde_json::from_value(value)
            .map(Inbound::Known)
            .context(error::ParseJSONToEnvelopeFailed { type_name })
    }

    /// Decode a binary frame payload, it must be utf-8 json text
    pub fn decode_binary(data: Vec<u8>) -> Result<Inbound, ParseMessageError> {
        let text = String::from_utf8(data).context(error::NotUtf8)?;
        Self::decode(&text)
    }

    /// encode to json text
    pub fn encode(&self) -> String {
        // all fields are plain json values, serialization can't fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Control envelope for subscribe/unsubscribe
    pub fn control(action: ControlAction, task_id: &str) -> Self {
        OutboundMessage::new(MessageType::Status, task_id)
            .with_data(serde_json::json!({ "action": action }))
            .stamp()
    }

    /// Heartbeat envelope
    pub fn heartbeat(task_id: &str) -> Self {
        OutboundMessage::new(MessageType::Heartbeat, task_id).stamp()
    }

    /// Heartbeat acknowledgement envelope
    pub fn heartbeat_ack(task_id: &str) -> Self {
        OutboundMessage::new(MessageType::Heartbeat, task_id)
            .with_data(serde_json::json!({ "ack": true }))
            .stamp()
    }

    /// Check if this is a heartbeat acknowledgement
    pub fn is_heartbeat_ack(&self) -> bool {
        self.r#type == MessageType::Heartbeat
            && self
                .data
                .as_ref()
                .and_then(|d| d.get("ack"))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
    }
}

/// An envelope not yet stamped with a timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// message type
    pub r#type: MessageType,
    /// task this message belongs to
    pub task_id: String,
    /// type specific payload
    pub data: Option<serde_json::Value>,
}

impl OutboundMessage {
    /// Create a message without payload
    pub fn new<S: Into<String>>(r#type: MessageType, task_id: S) -> Self {
        Self {
            r#type,
            task_id: task_id.into(),
            data: None,
        }
    }

    /// Attach payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Stamp with current epoch millis
    pub fn stamp(self) -> Envelope {
        self.stamp_at(chrono::Utc::now().timestamp_millis())
    }

    pub(crate) fn stamp_at(self, timestamp: i64) -> Envelope {
        Envelope {
            r#type: self.r#type,
            task_id: self.task_id,
            timestamp,
            data: self.data,
        }
    }
}
