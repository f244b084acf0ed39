//! WebSocket layer.
//!
//! - `/ws`: worker sessions speaking the register/command/status
//!   envelope protocol.
//! - `/events`: observer stream of worker events with per-connection
//!   subscriptions.
//! - `/echo`: diagnostic echo.

pub mod echo;
pub mod handler;
pub mod messages;
pub mod observer;
pub mod subscription;
pub mod worker_connection;
