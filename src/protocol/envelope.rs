//! Wire envelopes exchanged between the coordinator and its workers.
//!
//! Every WebSocket text frame carries exactly one JSON object tagged by
//! `type`:
//!
//! ```json
//! {"type": "register", "id": 42}
//! {"type": "command", "command": "return turtle.forward()"}
//! {"type": "status", "status": true, "data": 7}
//! ```
//!
//! `data` is embedded as raw JSON and omitted when there is no payload.
//! Objects with an unknown `type` decode to [`Envelope::Unrecognized`]
//! rather than failing, so the receiver can skip them without reporting
//! an error.

use serde::{Deserialize, Serialize};

use super::WorkerId;
use crate::error::AgentError;

/// A single tagged protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Worker → coordinator, sent once right after connecting.
    Register {
        /// The worker's identity.
        id: WorkerId,
    },
    /// Coordinator → worker: a command string to execute.
    Command {
        /// Source text of the command.
        command: String,
    },
    /// Worker → coordinator: outcome of exactly one command.
    Status {
        /// `true` on success, `false` on failure.
        status: bool,
        /// Success payload or failure detail.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    /// Any envelope whose `type` is not understood by this side.
    #[serde(other)]
    Unrecognized,
}

impl Envelope {
    /// Builds a `register` envelope.
    #[must_use]
    pub fn register(id: WorkerId) -> Self {
        Self::Register { id }
    }

    /// Builds a `command` envelope.
    #[must_use]
    pub fn command(command: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
        }
    }

    /// Builds a `status` envelope.
    #[must_use]
    pub fn status(status: bool, data: Option<serde_json::Value>) -> Self {
        Self::Status { status, data }
    }

    /// Returns the wire name of this envelope's `type`.
    #[must_use]
    pub const fn type_str(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Command { .. } => "command",
            Self::Status { .. } => "status",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// Parses one envelope from a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Protocol`] if the text is not JSON, is not an
    /// object with a `type` field, or a known `type` is missing fields.
    pub fn decode(text: &str) -> Result<Self, AgentError> {
        serde_json::from_str(text).map_err(|e| AgentError::Protocol(e.to_string()))
    }

    /// Serializes the envelope for a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Protocol`] if serialization fails.
    pub fn encode(&self) -> Result<String, AgentError> {
        if matches!(self, Self::Unrecognized) {
            return Err(AgentError::Protocol(
                "unrecognized envelopes cannot be sent".to_string(),
            ));
        }
        serde_json::to_string(self).map_err(|e| AgentError::Protocol(e.to_string()))
    }
}
