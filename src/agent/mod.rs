//! Worker agent: the remote half of the session protocol.
//!
//! An [`Agent`] connects to the coordinator, sends its identity, then runs
//! a strictly serialized loop: wait for a `command` envelope, run it
//! through the [`Executor`], report exactly one `status` envelope.
//!
//! ## Capability policy
//!
//! Commands arrive over the network, so they never run as native code.
//! The [`ScriptHandler`] evaluates a restricted language whose only
//! side effects are the functions registered in its
//! [`crate::script::Builtins`] table: identity, echo, error, a capped
//! sleep, the clock, and the simulated turtle in [`Rig`]. There is no
//! filesystem, network or process access, and every command runs under a
//! timeout on the blocking pool.

pub mod client;
pub mod executor;
pub mod handler;
pub mod rig;
pub mod session;

pub use client::Agent;
pub use executor::Executor;
pub use handler::{CommandHandler, ReturnShape, ScriptHandler};
pub use rig::Rig;
pub use session::{Session, SessionEnd, SessionState};
