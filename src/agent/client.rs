//! Connection management for the worker agent.

use tokio_tungstenite::connect_async;

use super::executor::Executor;
use super::handler::{CommandHandler, ScriptHandler};
use super::rig::Rig;
use super::session::{Session, SessionEnd};
use crate::config::WorkerConfig;
use crate::error::AgentError;
use crate::script::Builtins;

/// A worker agent: connects, runs sessions, and reconnects if configured.
#[derive(Debug)]
pub struct Agent<H> {
    config: WorkerConfig,
    executor: Executor<H>,
}

impl Agent<ScriptHandler> {
    /// Creates an agent running scripts against the standard library and
    /// a simulated turtle.
    #[must_use]
    pub fn with_rig(config: WorkerConfig, rig: &Rig) -> Self {
        let identity = serde_json::to_value(&config.worker_id).unwrap_or_default();
        let mut builtins = Builtins::standard(identity);
        rig.install(&mut builtins);
        let handler = ScriptHandler::new(builtins);
        Self::new(config, handler)
    }
}

impl<H: CommandHandler> Agent<H> {
    /// Creates an agent with a custom handler.
    #[must_use]
    pub fn new(config: WorkerConfig, handler: H) -> Self {
        let executor = Executor::new(handler, config.command_timeout);
        Self { config, executor }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Runs sessions until the coordinator goes away.
    ///
    /// Without reconnect, the first session's end is the agent's end.
    /// With reconnect, both connection failures and session ends trigger
    /// a new attempt after a doubling backoff, and every new session
    /// registers again.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Connection`] once connecting has failed more
    /// often than the reconnect policy allows.
    pub async fn run(&self) -> Result<(), AgentError> {
        let policy = self.config.reconnect;
        let mut failures: u32 = 0;

        loop {
            let outcome = self.run_once().await;
            match outcome {
                Ok(end) => {
                    failures = 0;
                    tracing::info!(?end, "session ended");
                    if !policy.enabled {
                        return Ok(());
                    }
                }
                Err(err) if err.is_fatal() => {
                    failures = failures.saturating_add(1);
                    if !policy.allows(failures) {
                        tracing::error!(error = %err, failures, "giving up on coordinator");
                        return Err(err);
                    }
                    tracing::warn!(error = %err, failures, "session failed");
                }
                Err(err) => return Err(err),
            }

            let delay = policy.backoff(failures.max(1));
            let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            tracing::info!(delay_ms, "reconnecting");
            tokio::time::sleep(delay).await;
        }
    }

    /// Connects once and runs a single session to completion.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Connection`] if the coordinator cannot be
    /// reached or a frame cannot be written.
    pub async fn run_once(&self) -> Result<SessionEnd, AgentError> {
        let url = &self.config.coordinator_url;
        tracing::info!(%url, worker = %self.config.worker_id, "connecting to coordinator");
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| AgentError::Connection(format!("{url}: {e}")))?;

        let mut session = Session::new(self.config.worker_id.clone());
        let result = session.run(socket, &self.executor).await;
        tracing::info!(
            worker = %self.config.worker_id,
            commands = session.commands_handled(),
            "session closed"
        );
        result
    }
}
