//! # cc-miner
//!
//! Remote command execution for ComputerCraft-style mining turtles.
//!
//! A coordinator hands out commands over WebSocket; each worker agent
//! registers under a stable identity, runs every command it receives in a
//! sandboxed script interpreter, and answers with exactly one status
//! envelope.
//!
//! ## Architecture
//!
//! ```text
//! Operators (HTTP, /events)            Worker agents (/ws)
//!     │                                     │
//!     ├── REST Handlers (api/)              ├── Agent + Session (agent/)
//!     ├── Observer stream (ws/)             ├── Executor → ScriptHandler
//!     │                                     ├── Script interpreter (script/)
//!     ├── WorkerService (service/)          └── Simulated turtle (agent::rig)
//!     ├── EventBus, WorkerRegistry (domain/)
//!     ├── Turtle proxy (turtle/)
//!     │
//!     └──────── envelope protocol (protocol/) ────────┘
//! ```

pub mod agent;
pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod script;
pub mod server;
pub mod service;
pub mod turtle;
pub mod ws;
