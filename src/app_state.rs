//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::CoordinatorConfig;
use crate::domain::{EventBus, WorkerRegistry};
use crate::service::WorkerService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Worker service for command routing and bookkeeping.
    pub worker_service: Arc<WorkerService>,
    /// Event bus for observer subscriptions.
    pub event_bus: EventBus,
    /// How long a new socket may take to send `register`.
    pub register_timeout: Duration,
}

impl AppState {
    /// Builds the domain and service layers from configuration.
    #[must_use]
    pub fn new(config: &CoordinatorConfig) -> Self {
        let registry = Arc::new(WorkerRegistry::new());
        let event_bus = EventBus::new(config.event_bus_capacity);
        let worker_service = Arc::new(WorkerService::new(
            registry,
            event_bus.clone(),
            config.command_timeout,
            config.command_queue_depth,
        ));
        Self {
            worker_service,
            event_bus,
            register_timeout: config.register_timeout,
        }
    }
}
