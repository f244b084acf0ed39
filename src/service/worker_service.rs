//! Worker service: routes commands to sessions and emits events.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::domain::{
    DisconnectReason, EventBus, PendingCommand, SessionId, WorkerEntry, WorkerEvent,
    WorkerRegistry, WorkerSummary,
};
use crate::error::CoordinatorError;
use crate::protocol::{ExecutionResult, WorkerId};
use crate::turtle::{CommandSink, Movement, Position};

/// Orchestration layer between the HTTP surface and worker sessions.
///
/// Owns the [`WorkerRegistry`] for state and the [`EventBus`] for event
/// emission. Sessions enter through [`WorkerService::open_session`];
/// callers reach them through [`WorkerService::send_command`], which
/// queues the command and waits for the single matching status.
#[derive(Debug, Clone)]
pub struct WorkerService {
    registry: Arc<WorkerRegistry>,
    event_bus: EventBus,
    command_timeout: Duration,
    queue_depth: usize,
}

impl WorkerService {
    /// Creates a new `WorkerService`.
    #[must_use]
    pub fn new(
        registry: Arc<WorkerRegistry>,
        event_bus: EventBus,
        command_timeout: Duration,
        queue_depth: usize,
    ) -> Self {
        Self {
            registry,
            event_bus,
            command_timeout,
            queue_depth: queue_depth.max(1),
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub const fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the inner [`WorkerRegistry`].
    #[must_use]
    pub const fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Returns how long a caller waits for a worker's answer.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Registers a new session for `worker_id` and returns its id and the
    /// receiving end of its command queue.
    ///
    /// An existing session under the same identity is replaced; its queue
    /// closes, which ends that connection.
    pub async fn open_session(
        &self,
        worker_id: WorkerId,
    ) -> (SessionId, mpsc::Receiver<PendingCommand>) {
        let (sender, receiver) = mpsc::channel(self.queue_depth);
        let session_id = SessionId::new();
        let entry = WorkerEntry::new(worker_id.clone(), session_id, sender);
        let replaced = self.registry.register(entry).await;

        if let Some(old_session) = replaced {
            tracing::warn!(worker = %worker_id, %old_session, "worker re-registered, replacing session");
            self.event_bus.publish(WorkerEvent::WorkerDisconnected {
                worker_id: worker_id.clone(),
                session_id: old_session,
                reason: DisconnectReason::Replaced,
                timestamp: Utc::now(),
            });
        }

        self.event_bus.publish(WorkerEvent::WorkerRegistered {
            worker_id: worker_id.clone(),
            session_id,
            replaced: replaced.is_some(),
            timestamp: Utc::now(),
        });

        tracing::info!(worker = %worker_id, %session_id, "worker registered");
        (session_id, receiver)
    }

    /// Removes a session whose connection ended.
    ///
    /// Does nothing if a newer session already owns the identity. Returns
    /// `true` if the session was removed.
    pub async fn close_session(&self, worker_id: &WorkerId, session_id: SessionId) -> bool {
        let removed = self.registry.remove_session(worker_id, session_id).await;
        if removed {
            self.event_bus.publish(WorkerEvent::WorkerDisconnected {
                worker_id: worker_id.clone(),
                session_id,
                reason: DisconnectReason::ConnectionClosed,
                timestamp: Utc::now(),
            });
            tracing::info!(worker = %worker_id, %session_id, "worker disconnected");
        }
        removed
    }

    /// Removes a worker on operator request, closing its connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::WorkerNotFound`] if the worker is not
    /// registered.
    pub async fn disconnect(&self, worker_id: &WorkerId) -> Result<SessionId, CoordinatorError> {
        let session_id = self.registry.remove(worker_id).await?;
        self.event_bus.publish(WorkerEvent::WorkerDisconnected {
            worker_id: worker_id.clone(),
            session_id,
            reason: DisconnectReason::Kicked,
            timestamp: Utc::now(),
        });
        tracing::info!(worker = %worker_id, %session_id, "worker kicked");
        Ok(session_id)
    }

    /// Lists all registered workers.
    pub async fn list_workers(&self) -> Vec<WorkerSummary> {
        self.registry.list().await
    }

    /// Returns the summary of one worker.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::WorkerNotFound`] if the worker is not
    /// registered.
    pub async fn get_worker(&self, worker_id: &WorkerId) -> Result<WorkerSummary, CoordinatorError> {
        let entry_lock = self.registry.get(worker_id).await?;
        let entry = entry_lock.read().await;
        Ok(WorkerSummary::from(&*entry))
    }

    /// Sends `command` to `worker_id` and waits for its status.
    ///
    /// The wait covers time spent queued behind earlier commands. A
    /// timed-out command stays in flight on the worker; its late status is
    /// discarded and the next queued command follows it.
    ///
    /// # Errors
    ///
    /// - [`CoordinatorError::InvalidRequest`] for a blank command.
    /// - [`CoordinatorError::WorkerNotFound`] if the worker is not
    ///   registered.
    /// - [`CoordinatorError::QueueFull`] if the worker's queue is full.
    /// - [`CoordinatorError::WorkerDisconnected`] if the session ends first.
    /// - [`CoordinatorError::CommandTimeout`] if no status arrives in time.
    pub async fn send_command(
        &self,
        worker_id: &WorkerId,
        command: String,
    ) -> Result<ExecutionResult, CoordinatorError> {
        if command.trim().is_empty() {
            return Err(CoordinatorError::InvalidRequest(
                "command must not be empty".to_string(),
            ));
        }

        let entry_lock = self.registry.get(worker_id).await?;
        let sender = entry_lock.read().await.commands.clone();
        // Waiting callers must not keep a replaced session's queue open.
        let entry_ref = Arc::downgrade(&entry_lock);
        drop(entry_lock);

        let (reply, reply_rx) = oneshot::channel();
        let pending = PendingCommand {
            command: command.clone(),
            reply,
        };
        sender.try_send(pending).map_err(|err| match err {
            TrySendError::Full(_) => CoordinatorError::QueueFull(worker_id.clone()),
            TrySendError::Closed(_) => CoordinatorError::WorkerDisconnected(worker_id.clone()),
        })?;
        drop(sender);

        let started = Instant::now();
        let result = match tokio::time::timeout(self.command_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => return Err(CoordinatorError::WorkerDisconnected(worker_id.clone())),
            Err(_) => {
                let timeout_ms =
                    u64::try_from(self.command_timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(worker = %worker_id, timeout_ms, "command timed out");
                return Err(CoordinatorError::CommandTimeout {
                    worker_id: worker_id.clone(),
                    timeout_ms,
                });
            }
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let success = result.is_success();
        if let Some(entry_lock) = entry_ref.upgrade() {
            entry_lock.write().await.record(success);
        }

        self.event_bus.publish(WorkerEvent::CommandCompleted {
            worker_id: worker_id.clone(),
            command,
            success,
            data: result.data().cloned(),
            elapsed_ms,
            timestamp: Utc::now(),
        });

        tracing::debug!(worker = %worker_id, success, elapsed_ms, "command completed");
        Ok(result)
    }

    /// Moves or turns a worker's turtle and returns its new position.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::CommandFailed`] if the worker refuses,
    /// plus the errors of [`WorkerService::send_command`].
    pub async fn move_turtle(
        &self,
        worker_id: &WorkerId,
        movement: Movement,
    ) -> Result<Position, CoordinatorError> {
        let entry_lock = self.registry.get(worker_id).await?;
        let turtle = Arc::clone(&entry_lock.read().await.turtle);
        let mut turtle = turtle.lock().await;
        let position = turtle.apply(self, movement).await?;
        tracing::info!(worker = %worker_id, ?movement, ?position, "turtle moved");
        Ok(position)
    }

    /// Asks a worker for its GPS location and updates the tracked position.
    ///
    /// # Errors
    ///
    /// Same as [`WorkerService::move_turtle`], plus
    /// [`CoordinatorError::Internal`] for a malformed reply.
    pub async fn locate_turtle(&self, worker_id: &WorkerId) -> Result<Position, CoordinatorError> {
        let entry_lock = self.registry.get(worker_id).await?;
        let turtle = Arc::clone(&entry_lock.read().await.turtle);
        let mut turtle = turtle.lock().await;
        turtle.locate(self).await?;
        Ok(turtle.position())
    }
}

impl CommandSink for WorkerService {
    fn dispatch(
        &self,
        worker_id: &WorkerId,
        command: String,
    ) -> impl Future<Output = Result<ExecutionResult, CoordinatorError>> + Send {
        self.send_command(worker_id, command)
    }
}
