//! Per-observer subscription filter.

use std::collections::HashSet;

pub use crate::protocol::WILDCARD;
use crate::protocol::WorkerId;

/// Tracks which workers an observer wants events for.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Explicit subscriptions. Ignored while `subscribe_all` is set.
    worker_ids: HashSet<WorkerId>,
    /// Wildcard `"*"` subscription.
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates an empty manager, which matches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds identities. The wildcard enables every worker.
    pub fn subscribe(&mut self, ids: &[WorkerId]) {
        for id in ids {
            if id.is_wildcard() {
                self.subscribe_all = true;
            } else {
                self.worker_ids.insert(id.clone());
            }
        }
    }

    /// Removes identities. The wildcard clears the wildcard flag only.
    pub fn unsubscribe(&mut self, ids: &[WorkerId]) {
        for id in ids {
            if id.is_wildcard() {
                self.subscribe_all = false;
            } else {
                self.worker_ids.remove(id);
            }
        }
    }

    /// Returns `true` if events for `worker_id` should be forwarded.
    #[must_use]
    pub fn matches(&self, worker_id: &WorkerId) -> bool {
        self.subscribe_all || self.worker_ids.contains(worker_id)
    }

    /// Returns the number of explicit subscriptions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.worker_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub const fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
