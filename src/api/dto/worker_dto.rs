//! Worker endpoint request and response bodies.

use serde::{Deserialize, Serialize};

use super::common_dto::PaginationMeta;
use crate::domain::WorkerSummary;
use crate::protocol::{ExecutionResult, WorkerId};
use crate::turtle::{Movement, Position};

/// Response body for `GET /api/v1/workers`.
#[derive(Debug, Serialize)]
pub struct WorkerListResponse {
    /// Workers on this page.
    pub data: Vec<WorkerSummary>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Request body for `POST /api/v1/workers/{id}/commands`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    /// Command source text.
    pub command: String,
}

/// Response body for a command the worker answered.
///
/// Mirrors the wire `status` envelope: `data` is omitted when the worker
/// returned nothing.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// Worker that ran the command.
    pub worker_id: WorkerId,
    /// Whether the command succeeded.
    pub status: bool,
    /// Result payload or failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandResponse {
    /// Builds the response from a worker's result.
    #[must_use]
    pub fn new(worker_id: WorkerId, result: ExecutionResult) -> Self {
        let status = result.is_success();
        let data = match result {
            ExecutionResult::Success => None,
            ExecutionResult::SuccessWithData(value) => Some(value),
            ExecutionResult::Failure(detail) => detail,
        };
        Self {
            worker_id,
            status,
            data,
        }
    }
}

/// Request body for `POST /api/v1/workers/{id}/move`.
#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest {
    /// `forward`, `back`, `up`, `down`, `turn_left` or `turn_right`.
    pub direction: Movement,
}

/// Response body for movement and locate endpoints.
#[derive(Debug, Serialize)]
pub struct PositionResponse {
    /// Worker that moved.
    pub worker_id: WorkerId,
    /// Tracked position after the request.
    pub position: Position,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn failure_detail_becomes_data() {
        let response = CommandResponse::new(WorkerId::Number(1), ExecutionResult::error("boom"));
        let Ok(value) = serde_json::to_value(&response) else {
            panic!("serialization failed");
        };
        assert_eq!(value, json!({"worker_id": 1, "status": false, "data": "boom"}));
    }

    #[test]
    fn bare_success_omits_data() {
        let response = CommandResponse::new(WorkerId::from("m"), ExecutionResult::Success);
        let Ok(value) = serde_json::to_value(&response) else {
            panic!("serialization failed");
        };
        assert_eq!(value, json!({"worker_id": "m", "status": true}));
    }

    #[test]
    fn move_request_accepts_turns() {
        let Ok(req) = serde_json::from_str::<MoveRequest>(r#"{"direction":"turn_left"}"#) else {
            panic!("should parse");
        };
        assert_eq!(req.direction, Movement::TurnLeft);
    }
}
