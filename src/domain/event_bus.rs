//! Fan-out of [`WorkerEvent`]s to `/events` observers.

use tokio::sync::broadcast;

use super::WorkerEvent;

/// Cloneable handle on the worker event channel.
///
/// An observer that falls more than `capacity` events behind loses the
/// oldest ones and sees [`broadcast::error::RecvError::Lagged`]; the
/// service never waits for observers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<WorkerEvent>,
}

impl EventBus {
    /// Creates a bus holding up to `capacity` undelivered events (at
    /// least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `event` to every observer connected right now.
    pub fn publish(&self, event: WorkerEvent) {
        let kind = event.event_type_str();
        match self.tx.send(event) {
            Ok(observers) => tracing::trace!(kind, observers, "event published"),
            Err(_) => tracing::trace!(kind, "event dropped, no observers"),
        }
    }

    /// Opens a receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.tx.subscribe()
    }

    /// Number of open receivers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
