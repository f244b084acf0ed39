//! Turtle model: block coordinates, headings and the coordinator-side
//! [`Turtle`] proxy.

pub mod proxy;
pub mod types;

pub use proxy::{CommandSink, Turtle, TurtleError};
pub use types::{Bearing, Direction, InventorySlot, Location, Movement, Position};
