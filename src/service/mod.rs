//! Service layer: command routing and session bookkeeping.
//!
//! [`WorkerService`] connects HTTP requests to worker sessions, keeps the
//! registry consistent, and emits events through the
//! [`super::domain::EventBus`].

pub mod worker_service;

pub use worker_service::WorkerService;
