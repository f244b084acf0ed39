//! Runs one command under a time limit and always yields a result.

use std::sync::Arc;
use std::time::Duration;

use super::handler::CommandHandler;
use crate::error::AgentError;
use crate::protocol::ExecutionResult;
use crate::script::Budget;

/// Extra time a handler gets to notice its spent budget before the
/// command is abandoned.
pub const OVERRUN_GRACE: Duration = Duration::from_millis(250);

/// Wraps a [`CommandHandler`] with the blocking-pool and timeout policy.
///
/// Compile errors, runtime errors, panics and timeouts all become
/// [`ExecutionResult::Failure`]. The handler gets a [`Budget`] of the
/// timeout and stops itself once it is spent, so the result is only
/// reported after the command can no longer act. A handler that ignores
/// its budget is abandoned after [`OVERRUN_GRACE`] and its blocking thread
/// runs to completion in the background.
#[derive(Debug)]
pub struct Executor<H> {
    handler: Arc<H>,
    timeout: Duration,
}

impl<H> Clone for Executor<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            timeout: self.timeout,
        }
    }
}

impl<H: CommandHandler> Executor<H> {
    /// Creates an executor with the given per-command limit.
    #[must_use]
    pub fn new(handler: H, timeout: Duration) -> Self {
        Self {
            handler: Arc::new(handler),
            timeout,
        }
    }

    /// Returns the per-command limit.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Compiles and runs `source`.
    pub async fn execute(&self, source: &str) -> ExecutionResult {
        let prepared = match self.handler.compile(source) {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::warn!(error = %err, "command rejected");
                return ExecutionResult::error(err.to_string());
            }
        };

        let handler = Arc::clone(&self.handler);
        let budget = Budget::starting_now(self.timeout);
        let task = tokio::task::spawn_blocking(move || handler.invoke(prepared, budget));
        let hard_limit = self.timeout.saturating_add(OVERRUN_GRACE);

        match tokio::time::timeout(hard_limit, task).await {
            Ok(Ok(Err(err @ AgentError::Timeout(_)))) => {
                tracing::warn!(error = %err, "command ran out of time");
                ExecutionResult::error(err.to_string())
            }
            Ok(Ok(Ok(shape))) => shape.into_result(),
            Ok(Ok(Err(err))) => {
                tracing::debug!(error = %err, "command raised");
                ExecutionResult::error(err.to_string())
            }
            Ok(Err(join_err)) => {
                tracing::error!(error = %join_err, "command task failed");
                ExecutionResult::error(
                    AgentError::Execution("command aborted unexpectedly".to_string()).to_string(),
                )
            }
            Err(_) => {
                let millis = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(timeout_ms = millis, "command abandoned past its budget");
                ExecutionResult::error(AgentError::Timeout(millis).to_string())
            }
        }
    }
}
