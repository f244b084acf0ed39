//! Registry entry for one live worker session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc, oneshot};

use super::SessionId;
use crate::protocol::{ExecutionResult, WorkerId};
use crate::turtle::{Position, Turtle};

/// A command waiting in a session's queue, plus where to send its result.
#[derive(Debug)]
pub struct PendingCommand {
    /// Command text.
    pub command: String,
    /// Completed with the worker's single status.
    pub reply: oneshot::Sender<ExecutionResult>,
}

/// A registered worker.
///
/// The `commands` sender is the only way to reach the worker's socket
/// task; dropping the entry drops the sender, which closes the session.
#[derive(Debug)]
pub struct WorkerEntry {
    /// Worker identity.
    pub worker_id: WorkerId,

    /// Current connection.
    pub session_id: SessionId,

    /// Queue into the connection task.
    pub commands: mpsc::Sender<PendingCommand>,

    /// Coordinator-side turtle model. Locked for the whole of a movement
    /// so that concurrent moves do not interleave.
    pub turtle: Arc<Mutex<Turtle>>,

    /// Registration timestamp.
    pub connected_at: DateTime<Utc>,

    /// Timestamp of the last answered command.
    pub last_command_at: Option<DateTime<Utc>>,

    /// Commands answered with a success status.
    pub commands_succeeded: u64,

    /// Commands answered with a failure status.
    pub commands_failed: u64,
}

impl WorkerEntry {
    /// Creates an entry for a freshly registered session.
    #[must_use]
    pub fn new(
        worker_id: WorkerId,
        session_id: SessionId,
        commands: mpsc::Sender<PendingCommand>,
    ) -> Self {
        let turtle = Turtle::new(worker_id.clone());
        Self {
            worker_id,
            session_id,
            commands,
            turtle: Arc::new(Mutex::new(turtle)),
            connected_at: Utc::now(),
            last_command_at: None,
            commands_succeeded: 0,
            commands_failed: 0,
        }
    }

    /// Records one answered command.
    pub fn record(&mut self, success: bool) {
        if success {
            self.commands_succeeded += 1;
        } else {
            self.commands_failed += 1;
        }
        self.last_command_at = Some(Utc::now());
    }
}

/// Lightweight summary of a worker for list and detail endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    /// Worker identity.
    pub worker_id: WorkerId,
    /// Current session.
    pub session_id: SessionId,
    /// Registration timestamp.
    pub connected_at: DateTime<Utc>,
    /// Timestamp of the last answered command.
    pub last_command_at: Option<DateTime<Utc>>,
    /// Commands answered with a success status.
    pub commands_succeeded: u64,
    /// Commands answered with a failure status.
    pub commands_failed: u64,
    /// Commands waiting in the queue.
    pub queued: usize,
    /// Tracked turtle position, if not mid-move.
    pub position: Option<Position>,
}

impl From<&WorkerEntry> for WorkerSummary {
    fn from(entry: &WorkerEntry) -> Self {
        let queued = entry
            .commands
            .max_capacity()
            .saturating_sub(entry.commands.capacity());
        let position = entry.turtle.try_lock().ok().map(|t| t.position());
        Self {
            worker_id: entry.worker_id.clone(),
            session_id: entry.session_id,
            connected_at: entry.connected_at,
            last_command_at: entry.last_command_at,
            commands_succeeded: entry.commands_succeeded,
            commands_failed: entry.commands_failed,
            queued,
            position,
        }
    }
}
