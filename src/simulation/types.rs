//! Core types for the convoy simulation
//!
//! Identifiers, the 2D position/vector type and the tuning constants shared by
//! every other module. Screen coordinates: x grows to the east, y to the south.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// A wrapper type for junction IDs (dense, in input order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JunctionId(pub usize);

/// A wrapper type for road segment IDs (dense, in input order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoadId(pub usize);

/// A sub-intersection is addressed by its junction and its slot in that
/// junction's list. The list is rebuilt deterministically by `fix()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubIntersectionId {
    pub junction: JunctionId,
    pub index: usize,
}

/// A wrapper type for signal post IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalId(pub usize);

new_key_type! {
    /// Handle of a vehicle in the fleet arena
    pub struct VehicleId;
    /// Handle of a convoy in the fleet arena
    pub struct ConvoyId;
}

/// Side length of the square drawn for every junction
pub const JUNCTION_SIZE: f32 = 60.0;

/// Vehicle footprint, across the lane
pub const VEHICLE_WIDTH: f32 = 14.0;
/// Vehicle footprint, along the lane
pub const VEHICLE_LENGTH: f32 = 26.0;

/// Signal detection zone, across the lane
pub const SIGNAL_ZONE_WIDTH: f32 = JUNCTION_SIZE / 2.0;
/// Signal detection zone, along the lane
pub const SIGNAL_ZONE_DEPTH: f32 = 12.0;

/// Base speed in pixels per millisecond
pub const NORMAL_SPEED: f32 = 0.1;
/// Ratio between two neighbouring speed steps
pub const SPEED_STEP: f32 = 1.2;

/// How long a crashed vehicle stays on the map
pub const CRASH_DURATION_MS: f32 = 2000.0;
/// Number of frames of the crash animation
pub const CRASH_FRAMES: u8 = 4;

/// Tolerance used when comparing headings (radians)
pub const ANGLE_EPSILON: f32 = 1e-4;

/// A 2D position in the simulation; also used for direction vectors
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ZERO: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        (*other - *self).length()
    }

    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(&self, other: &Position) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// z component of the 3D cross product
    pub fn cross(&self, other: &Position) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Unit vector in the same direction, or zero for the zero vector
    pub fn normalized(&self) -> Position {
        let len = self.length();
        if len > 0.0 {
            Position::new(self.x / len, self.y / len)
        } else {
            Position::ZERO
        }
    }

    /// Rotated a quarter turn clockwise on screen: the right-hand side of a
    /// vehicle facing along `self`.
    pub fn right(&self) -> Position {
        Position::new(-self.y, self.x)
    }

    /// Bit-exact equality, used to merge sub-intersections
    pub fn same_bits(&self, other: &Position) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}

impl Add for Position {
    type Output = Position;
    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Position {
    type Output = Position;
    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Position {
    type Output = Position;
    fn mul(self, rhs: f32) -> Position {
        Position::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Position {
    type Output = Position;
    fn neg(self) -> Position {
        Position::new(-self.x, -self.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// The four sides of a junction square
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinal {
    North,
    East,
    South,
    West,
}

impl Cardinal {
    pub fn opposite(self) -> Cardinal {
        match self {
            Cardinal::North => Cardinal::South,
            Cardinal::East => Cardinal::West,
            Cardinal::South => Cardinal::North,
            Cardinal::West => Cardinal::East,
        }
    }

    /// Slot index in per-side arrays
    pub fn index(self) -> usize {
        match self {
            Cardinal::North => 0,
            Cardinal::East => 1,
            Cardinal::South => 2,
            Cardinal::West => 3,
        }
    }
}
