use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::middleware::Role;

/// Wire shape of every inbound frame: `{"type": "...", "data": ...}`
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Inbound events from client to server
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    GlucoseUpdate(Value),
    PredictionUpdate(Value),
    Notification(Value),
    /// Well-formed frame with a tag the relay does not handle
    Unknown { kind: String },
}

impl InboundMessage {
    pub const GLUCOSE_UPDATE: &'static str = "glucose_update";
    pub const PREDICTION_UPDATE: &'static str = "prediction_update";
    pub const NOTIFICATION: &'static str = "notification";

    /// Parse a text frame. Fails only for frames that are not a JSON object
    /// with a string `type`.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        // Arrays would otherwise deserialize as a struct sequence
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(serde_json::Error::custom("relay frame must be a JSON object"));
        }
        let raw: RawFrame = serde_json::from_value(value)?;
        Ok(match raw.kind.as_str() {
            Self::GLUCOSE_UPDATE => InboundMessage::GlucoseUpdate(raw.data),
            Self::PREDICTION_UPDATE => InboundMessage::PredictionUpdate(raw.data),
            Self::NOTIFICATION => InboundMessage::Notification(raw.data),
            _ => InboundMessage::Unknown { kind: raw.kind },
        })
    }

    /// Label used for logs and metrics
    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::GlucoseUpdate(_) => Self::GLUCOSE_UPDATE,
            InboundMessage::PredictionUpdate(_) => Self::PREDICTION_UPDATE,
            InboundMessage::Notification(_) => Self::NOTIFICATION,
            InboundMessage::Unknown { .. } => "unknown",
        }
    }
}

/// Outbound event kinds emitted by the relay itself.
///
/// Collaborators may push any other `type` string through the internal API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    Connection,
    GlucoseAlert,
    Prediction,
    Notification,
}

impl OutboundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundKind::Connection => "connection",
            OutboundKind::GlucoseAlert => "glucose_alert",
            OutboundKind::Prediction => "prediction",
            OutboundKind::Notification => "notification",
        }
    }
}

/// Outbound events from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl OutboundMessage {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: None,
        }
    }

    pub fn relay(kind: OutboundKind, data: Value) -> Self {
        Self::new(kind.as_str(), data)
    }

    /// Stamp with the current server time
    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(Utc::now());
        self
    }

    /// Confirmation sent once right after a successful upgrade
    pub fn connection(user_id: &str, role: Role) -> Self {
        Self::relay(
            OutboundKind::Connection,
            json!({
                "user_id": user_id,
                "role": role,
                "message": "connected",
            }),
        )
        .stamped()
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
