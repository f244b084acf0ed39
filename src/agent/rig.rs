//! Simulated turtle hardware for a worker.
//!
//! The rig owns a position, a fuel tank and a 16-slot inventory, and
//! exposes them to scripts under the `turtle.*` and `gps.*` names with the
//! same return conventions as the real turtle API: moves return `true`,
//! or `false` plus a reason.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Value, json};

use crate::error::AgentError;
use crate::script::Builtins;
use crate::script::builtins::integer_arg;
use crate::turtle::{Direction, InventorySlot, Position};

/// Number of inventory slots.
pub const INVENTORY_SLOTS: usize = 16;

/// Fuel tank capacity.
pub const FUEL_LIMIT: u64 = 100_000;

#[derive(Debug)]
struct RigState {
    position: Position,
    fuel: u64,
    inventory: Vec<Option<InventorySlot>>,
}

/// Shared handle on the simulated turtle.
#[derive(Debug, Clone)]
pub struct Rig {
    state: Arc<Mutex<RigState>>,
}

impl Rig {
    /// Creates a rig at the origin facing north with `fuel` units.
    #[must_use]
    pub fn new(fuel: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(RigState {
                position: Position::default(),
                fuel: fuel.min(FUEL_LIMIT),
                inventory: vec![None; INVENTORY_SLOTS],
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RigState>, String> {
        self.state
            .lock()
            .map_err(|_| "turtle state poisoned".to_string())
    }

    /// Returns the current position.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Execution`] if the state lock is poisoned.
    pub fn position(&self) -> Result<Position, AgentError> {
        self.lock().map(|s| s.position).map_err(AgentError::Execution)
    }

    /// Returns the remaining fuel.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Execution`] if the state lock is poisoned.
    pub fn fuel(&self) -> Result<u64, AgentError> {
        self.lock().map(|s| s.fuel).map_err(AgentError::Execution)
    }

    /// Puts `item` into 1-based `slot`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Execution`] if the slot is out of range.
    pub fn stock(&self, slot: usize, item: InventorySlot) -> Result<(), AgentError> {
        let mut state = self.lock().map_err(AgentError::Execution)?;
        let entry = slot
            .checked_sub(1)
            .and_then(|i| state.inventory.get_mut(i))
            .ok_or_else(|| AgentError::Execution(format!("slot {slot} out of range")))?;
        *entry = Some(item);
        Ok(())
    }

    fn step(&self, direction: Direction) -> Result<Vec<Value>, String> {
        let mut state = self.lock()?;
        if state.fuel == 0 {
            return Ok(vec![Value::Bool(false), json!("Out of fuel")]);
        }
        let Some(next) = state.position.stepped(direction) else {
            return Ok(vec![Value::Bool(false), json!("Out of bounds")]);
        };
        state.fuel -= 1;
        state.position = next;
        Ok(vec![Value::Bool(true)])
    }

    fn turn(&self, right: bool) -> Result<Vec<Value>, String> {
        let mut state = self.lock()?;
        state.position.bearing = if right {
            state.position.bearing.turned_right()
        } else {
            state.position.bearing.turned_left()
        };
        Ok(vec![Value::Bool(true)])
    }

    fn refuel(&self, args: &[Value]) -> Result<Vec<Value>, String> {
        let amount = integer_arg(args, 0, "turtle.refuel")?;
        let amount = u64::try_from(amount).map_err(|_| "turtle.refuel: negative amount")?;
        let mut state = self.lock()?;
        state.fuel = state.fuel.saturating_add(amount).min(FUEL_LIMIT);
        Ok(vec![Value::Bool(true)])
    }

    fn item_detail(&self, args: &[Value]) -> Result<Vec<Value>, String> {
        let slot = integer_arg(args, 0, "turtle.getItemDetail")?;
        let state = self.lock()?;
        let entry = usize::try_from(slot)
            .ok()
            .and_then(|s| s.checked_sub(1))
            .and_then(|i| state.inventory.get(i))
            .ok_or_else(|| format!("turtle.getItemDetail: slot {slot} out of range"))?;
        Ok(vec![match entry {
            Some(item) => json!({"name": item.name, "count": item.count}),
            None => Value::Null,
        }])
    }

    /// Registers the `turtle.*` and `gps.locate` functions.
    pub fn install(&self, builtins: &mut Builtins) {
        let moves = [
            ("turtle.forward", Direction::Forward),
            ("turtle.back", Direction::Back),
            ("turtle.up", Direction::Up),
            ("turtle.down", Direction::Down),
        ];
        for (name, direction) in moves {
            let rig = self.clone();
            builtins.register(name, move |_, _| rig.step(direction));
        }

        let rig = self.clone();
        builtins.register("turtle.turnLeft", move |_, _| rig.turn(false));
        let rig = self.clone();
        builtins.register("turtle.turnRight", move |_, _| rig.turn(true));
        let rig = self.clone();
        builtins.register("turtle.getFuelLevel", move |_, _| {
            Ok(vec![Value::from(rig.lock()?.fuel)])
        });
        let rig = self.clone();
        builtins.register("turtle.refuel", move |args, _| rig.refuel(args));
        let rig = self.clone();
        builtins.register("turtle.getItemDetail", move |args, _| rig.item_detail(args));
        let rig = self.clone();
        builtins.register("gps.locate", move |_, _| {
            let location = rig.lock()?.position.location;
            Ok(vec![json!({"x": location.x, "y": location.y, "z": location.z})])
        });
    }
}
