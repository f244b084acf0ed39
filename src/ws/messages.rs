//! Observer stream message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::WorkerId;

/// Top-level message on the `/events` stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverMessage {
    /// Client-provided ID for requests; server-generated for events.
    #[serde(default)]
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: ObserverMessageType,
    /// ISO-8601 timestamp.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ObserverMessage {
    /// Reply to the request with `id`.
    #[must_use]
    pub fn response(id: String, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type: ObserverMessageType::Response,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Broadcast event with a fresh id.
    #[must_use]
    pub fn event(payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            msg_type: ObserverMessageType::Event,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Error reply to the request with `id`.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self {
            id,
            msg_type: ObserverMessageType::Error,
            timestamp: Utc::now(),
            payload: serde_json::json!({ "code": code, "message": message }),
        }
    }

    /// Serializes to a text frame body.
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Discriminator for observer message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ObserverMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands an observer can send, carried in the payload of a
/// [`ObserverMessageType::Command`] message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ObserverCommand {
    /// Receive events for these workers. `"*"` subscribes to all.
    Subscribe {
        /// Worker identities.
        worker_ids: Vec<WorkerId>,
    },
    /// Stop receiving events for these workers. `"*"` drops the wildcard.
    Unsubscribe {
        /// Worker identities.
        worker_ids: Vec<WorkerId>,
    },
    /// Snapshot of the registry.
    ListWorkers,
}
