//! Session protocol shared by the coordinator and the worker agent.
//!
//! Defines worker identities, the tagged JSON [`Envelope`] carried in
//! every WebSocket frame, and the [`ExecutionResult`] a worker reports
//! for each command.

pub mod envelope;
pub mod result;
pub mod worker_id;

pub use envelope::Envelope;
pub use result::ExecutionResult;
pub use worker_id::{WILDCARD, WorkerId};
