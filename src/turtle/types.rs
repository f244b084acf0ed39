//! Position and movement types shared by the coordinator's turtle model
//! and the worker's simulated rig.
//!
//! Coordinates follow the block-world convention: north is `-z`, east is
//! `+x`, up is `+y`.

use serde::{Deserialize, Serialize};

/// A block coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// East/west axis.
    pub x: i64,
    /// Vertical axis.
    pub y: i64,
    /// North/south axis.
    pub z: i64,
}

impl Location {
    /// Creates a location.
    #[must_use]
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

/// Compass heading of a turtle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bearing {
    /// Facing `-z`.
    #[default]
    North,
    /// Facing `+x`.
    East,
    /// Facing `+z`.
    South,
    /// Facing `-x`.
    West,
}

impl Bearing {
    /// Heading after a 90° clockwise turn.
    #[must_use]
    pub const fn turned_right(self) -> Self {
        match self {
            Self::North => Self::East,
            Self::East => Self::South,
            Self::South => Self::West,
            Self::West => Self::North,
        }
    }

    /// Heading after a 90° counter-clockwise turn.
    #[must_use]
    pub const fn turned_left(self) -> Self {
        match self {
            Self::North => Self::West,
            Self::West => Self::South,
            Self::South => Self::East,
            Self::East => Self::North,
        }
    }

    /// Unit `(dx, dz)` of one step forward.
    #[must_use]
    pub const fn forward_delta(self) -> (i64, i64) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }
}

/// A single-block translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// One block along the bearing.
    Forward,
    /// One block against the bearing.
    Back,
    /// One block up.
    Up,
    /// One block down.
    Down,
}

impl Direction {
    /// Name of the matching turtle API function.
    #[must_use]
    pub const fn api_name(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Back => "back",
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Any single turtle manoeuvre: a step or a quarter turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    /// Step forwards.
    Forward,
    /// Step backwards.
    Back,
    /// Step up.
    Up,
    /// Step down.
    Down,
    /// Quarter turn counter-clockwise.
    TurnLeft,
    /// Quarter turn clockwise.
    TurnRight,
}

impl Movement {
    /// The translation this manoeuvre makes, or `None` for a turn.
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Forward => Some(Direction::Forward),
            Self::Back => Some(Direction::Back),
            Self::Up => Some(Direction::Up),
            Self::Down => Some(Direction::Down),
            Self::TurnLeft | Self::TurnRight => None,
        }
    }
}

/// Location plus bearing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Where the turtle is.
    pub location: Location,
    /// Where the turtle faces.
    pub bearing: Bearing,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub const fn new(location: Location, bearing: Bearing) -> Self {
        Self { location, bearing }
    }

    /// Position after one step in `direction`, or `None` if a
    /// coordinate would leave the `i64` range. The bearing is unchanged.
    #[must_use]
    pub fn stepped(self, direction: Direction) -> Option<Self> {
        let (dx, dz) = self.bearing.forward_delta();
        let Location { x, y, z } = self.location;
        let location = match direction {
            Direction::Forward => Location::new(x.checked_add(dx)?, y, z.checked_add(dz)?),
            Direction::Back => Location::new(x.checked_sub(dx)?, y, z.checked_sub(dz)?),
            Direction::Up => Location::new(x, y.checked_add(1)?, z),
            Direction::Down => Location::new(x, y.checked_sub(1)?, z),
        };
        Some(Self {
            location,
            bearing: self.bearing,
        })
    }
}

/// Contents of one inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    /// Item identifier (e.g. `minecraft:cobblestone`).
    pub name: String,
    /// Number of items in the slot.
    pub count: u32,
}
