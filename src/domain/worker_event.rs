//! Domain events reflecting worker lifecycle and command traffic.
//!
//! Every registration, disconnect and completed command emits a
//! [`WorkerEvent`] through the [`super::EventBus`]. Observers connected to
//! `/events` receive them filtered by worker.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SessionId;
use crate::protocol::WorkerId;

/// Why a worker session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The socket closed or failed.
    ConnectionClosed,
    /// A newer session registered under the same identity.
    Replaced,
    /// An operator removed the worker.
    Kicked,
}

/// Domain event emitted after every registry change or command.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// A worker completed the register handshake.
    WorkerRegistered {
        /// Worker identity.
        worker_id: WorkerId,
        /// The new session.
        session_id: SessionId,
        /// Whether an older session with the same identity was evicted.
        replaced: bool,
        /// Registration timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A worker session left the registry.
    WorkerDisconnected {
        /// Worker identity.
        worker_id: WorkerId,
        /// The session that ended.
        session_id: SessionId,
        /// Why it ended.
        reason: DisconnectReason,
        /// Disconnect timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A worker answered a command.
    CommandCompleted {
        /// Worker identity.
        worker_id: WorkerId,
        /// The command text that was run.
        command: String,
        /// Whether the worker reported success.
        success: bool,
        /// Result payload or failure detail.
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        /// Round trip in milliseconds.
        elapsed_ms: u64,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl WorkerEvent {
    /// Returns the worker this event concerns.
    #[must_use]
    pub const fn worker_id(&self) -> &WorkerId {
        match self {
            Self::WorkerRegistered { worker_id, .. }
            | Self::WorkerDisconnected { worker_id, .. }
            | Self::CommandCompleted { worker_id, .. } => worker_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::WorkerRegistered { .. } => "worker_registered",
            Self::WorkerDisconnected { .. } => "worker_disconnected",
            Self::CommandCompleted { .. } => "command_completed",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn registered_event_type() {
        let event = WorkerEvent::WorkerRegistered {
            worker_id: WorkerId::Number(3),
            session_id: SessionId::new(),
            replaced: false,
            timestamp: Utc::now(),
        };
        assert_eq!(event.event_type_str(), "worker_registered");
        assert_eq!(event.worker_id(), &WorkerId::Number(3));
    }

    #[test]
    fn command_completed_serializes_with_tag() {
        let event = WorkerEvent::CommandCompleted {
            worker_id: WorkerId::from("miner-1"),
            command: "return 1".to_string(),
            success: true,
            data: Some(json!(1)),
            elapsed_ms: 4,
            timestamp: Utc::now(),
        };
        let Ok(value) = serde_json::to_value(&event) else {
            panic!("serialization failed");
        };
        assert_eq!(value.get("event_type"), Some(&json!("command_completed")));
        assert_eq!(value.get("worker_id"), Some(&json!("miner-1")));
        assert_eq!(value.get("data"), Some(&json!(1)));
    }

    #[test]
    fn disconnect_reason_is_snake_case() {
        let Ok(json) = serde_json::to_string(&DisconnectReason::ConnectionClosed) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"connection_closed\"");
    }
}
