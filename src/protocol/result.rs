//! Normalized outcome of one command.

use serde::Serialize;
use serde_json::Value;

use super::Envelope;

/// Tri-state outcome of running a command string.
///
/// Constructed once per command, turned into exactly one
/// [`Envelope::Status`] and then discarded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum ExecutionResult {
    /// The command succeeded and produced no payload.
    Success,
    /// The command succeeded with a payload.
    SuccessWithData(Value),
    /// The command failed; the detail is optional.
    Failure(Option<Value>),
}

impl ExecutionResult {
    /// Success with `value`, collapsing `null` to [`Self::Success`].
    #[must_use]
    pub fn success(value: Value) -> Self {
        if value.is_null() {
            Self::Success
        } else {
            Self::SuccessWithData(value)
        }
    }

    /// Failure with `detail`, dropping a `null` detail.
    #[must_use]
    pub fn failure(detail: Value) -> Self {
        if detail.is_null() {
            Self::Failure(None)
        } else {
            Self::Failure(Some(detail))
        }
    }

    /// Failure carrying a plain error message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Failure(Some(Value::String(message.into())))
    }

    /// Returns `true` for both success variants.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failure(_))
    }

    /// Returns the payload or failure detail, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        match self {
            Self::Success | Self::Failure(None) => None,
            Self::SuccessWithData(v) | Self::Failure(Some(v)) => Some(v),
        }
    }

    /// Rebuilds a result from the fields of a received `status` envelope.
    #[must_use]
    pub fn from_status(status: bool, data: Option<Value>) -> Self {
        let data = data.unwrap_or(Value::Null);
        if status {
            Self::success(data)
        } else {
            Self::failure(data)
        }
    }

    /// Encodes the result as its single outbound envelope.
    #[must_use]
    pub fn into_envelope(self) -> Envelope {
        match self {
            Self::Success => Envelope::status(true, None),
            Self::SuccessWithData(v) => Envelope::status(true, Some(v)),
            Self::Failure(detail) => Envelope::status(false, detail),
        }
    }
}
