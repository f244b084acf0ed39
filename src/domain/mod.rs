//! Domain layer: coordinator-side worker registry and event system.
//!
//! This module contains the session identity, registry entries with their
//! command queues, the event bus for broadcasting lifecycle changes, and
//! the registry itself.

pub mod event_bus;
pub mod session_id;
pub mod worker_entry;
pub mod worker_event;
pub mod worker_registry;

pub use event_bus::EventBus;
pub use session_id::SessionId;
pub use worker_entry::{PendingCommand, WorkerEntry, WorkerSummary};
pub use worker_event::{DisconnectReason, WorkerEvent};
pub use worker_registry::WorkerRegistry;
