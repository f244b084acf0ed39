//! Error types for both halves of the protocol.
//!
//! [`AgentError`] is the worker-side taxonomy. Per-command failures
//! (`Protocol`, `Compile`, `Execution`, `Timeout`) are contained by the
//! session and reported back as a failure status; only `Connection` and
//! `Config` end the agent.
//!
//! [`CoordinatorError`] is the coordinator-side error. Each variant maps
//! to an HTTP status code and a structured JSON error response.
//!
//! [`ConfigError`] is shared by both binaries' startup configuration.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::protocol::WorkerId;

/// Worker agent errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Coordinator unreachable, or the connection failed mid-session.
    #[error("connection error: {0}")]
    Connection(String),

    /// A received frame is not a valid envelope.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The command text could not be compiled.
    #[error("compile error: {0}")]
    Compile(String),

    /// The command raised while running.
    #[error("execution error: {0}")]
    Execution(String),

    /// The command did not finish within the configured limit.
    #[error("command timed out after {0} ms")]
    Timeout(u64),

    /// Startup configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Startup configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is set but cannot be used.
    #[error("{key}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl AgentError {
    /// Returns `true` if the error ends the session rather than a single
    /// command.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Config(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AgentError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "worker not found: 42",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Coordinator error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                   |
/// |-----------|-------------------|-------------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request               |
/// | 2000–2999 | Worker state      | 404 Not Found / 409 / 503     |
/// | 3000–3999 | Server            | 500 / 504                     |
/// | 4000–4999 | Command outcome   | 422 Unprocessable Entity      |
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// No live session is registered under the identity.
    #[error("worker not found: {0}")]
    WorkerNotFound(WorkerId),

    /// The worker's session ended before it answered.
    #[error("worker disconnected: {0}")]
    WorkerDisconnected(WorkerId),

    /// The worker's command queue is full.
    #[error("command queue full for worker {0}")]
    QueueFull(WorkerId),

    /// The worker did not answer within the configured limit.
    #[error("worker {worker_id} did not answer within {timeout_ms} ms")]
    CommandTimeout {
        /// Worker that was asked.
        worker_id: WorkerId,
        /// Limit that elapsed.
        timeout_ms: u64,
    },

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The worker reported a failure status.
    #[error("command failed on worker {worker_id}")]
    CommandFailed {
        /// Worker that reported the failure.
        worker_id: WorkerId,
        /// Failure detail as reported.
        detail: Option<serde_json::Value>,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::WorkerNotFound(_) => 2001,
            Self::WorkerDisconnected(_) => 2002,
            Self::QueueFull(_) => 2003,
            Self::Internal(_) => 3000,
            Self::CommandTimeout { .. } => 3001,
            Self::CommandFailed { .. } => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::WorkerNotFound(_) => StatusCode::NOT_FOUND,
            Self::WorkerDisconnected(_) => StatusCode::CONFLICT,
            Self::QueueFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::CommandTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::CommandFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();
        let details = match self {
            Self::CommandFailed { detail, .. } => detail,
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
