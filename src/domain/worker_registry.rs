//! Concurrent worker storage with per-entry locking.
//!
//! [`WorkerRegistry`] maps each identity to at most one live session. A
//! new registration under an existing identity replaces the old entry;
//! removal on disconnect is conditional on the session id so a stale
//! connection cannot evict its successor.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::SessionId;
use super::worker_entry::{WorkerEntry, WorkerSummary};
use crate::error::CoordinatorError;
use crate::protocol::WorkerId;

/// Central store for all live worker sessions.
///
/// Uses a `RwLock<HashMap<...>>` for the outer map and per-entry
/// `Arc<RwLock<WorkerEntry>>` so that bookkeeping for one worker never
/// blocks another.
#[derive(Debug)]
pub struct WorkerRegistry {
    workers: RwLock<HashMap<WorkerId, Arc<RwLock<WorkerEntry>>>>,
}

impl WorkerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            workers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a session, replacing any existing one with the same
    /// identity.
    ///
    /// Returns the replaced session's id. Its entry is dropped here, which
    /// closes its command queue.
    pub async fn register(&self, entry: WorkerEntry) -> Option<SessionId> {
        let worker_id = entry.worker_id.clone();
        let previous = {
            let mut map = self.workers.write().await;
            map.insert(worker_id, Arc::new(RwLock::new(entry)))
        };
        match previous {
            Some(old) => Some(old.read().await.session_id),
            None => None,
        }
    }

    /// Returns the entry for `worker_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::WorkerNotFound`] if no session is
    /// registered under the identity.
    pub async fn get(
        &self,
        worker_id: &WorkerId,
    ) -> Result<Arc<RwLock<WorkerEntry>>, CoordinatorError> {
        let map = self.workers.read().await;
        map.get(worker_id)
            .cloned()
            .ok_or_else(|| CoordinatorError::WorkerNotFound(worker_id.clone()))
    }

    /// Removes `worker_id` unconditionally, returning the removed session.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::WorkerNotFound`] if no session is
    /// registered under the identity.
    pub async fn remove(&self, worker_id: &WorkerId) -> Result<SessionId, CoordinatorError> {
        let removed = self.workers.write().await.remove(worker_id);
        let entry = removed.ok_or_else(|| CoordinatorError::WorkerNotFound(worker_id.clone()))?;
        let session_id = entry.read().await.session_id;
        Ok(session_id)
    }

    /// Removes `worker_id` only if `session_id` still owns it.
    ///
    /// Returns `true` if an entry was removed.
    pub async fn remove_session(&self, worker_id: &WorkerId, session_id: SessionId) -> bool {
        let mut map = self.workers.write().await;
        let owned = match map.get(worker_id) {
            Some(entry) => entry.read().await.session_id == session_id,
            None => false,
        };
        if owned {
            map.remove(worker_id);
        }
        owned
    }

    /// Returns summaries of all workers ordered by identity.
    pub async fn list(&self) -> Vec<WorkerSummary> {
        let map = self.workers.read().await;
        let mut summaries = Vec::with_capacity(map.len());
        for entry_lock in map.values() {
            let entry = entry_lock.read().await;
            summaries.push(WorkerSummary::from(&*entry));
        }
        summaries.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
        summaries
    }

    /// Returns the number of registered workers.
    pub async fn len(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Returns `true` if no worker is registered.
    pub async fn is_empty(&self) -> bool {
        self.workers.read().await.is_empty()
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
