//! Fundamental geometric and simulation types.

use std::f64::consts::{PI, TAU};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier for a submarine or torpedo. Never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

/// Opaque identifier of the account that owns entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", self.0)
    }
}

/// Position in the ocean (meters).
/// x = East, y = North, depth = meters below the surface (positive down).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub depth: f64,
}

/// Simulation time tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimTime {
    /// Current tick number (increments by 1 each tick).
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub elapsed_secs: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, depth: f64) -> Self {
        Self { x, y, depth }
    }

    /// Range to another position in meters (3D distance).
    pub fn range_to(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.depth - self.depth;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Horizontal range (ignoring depth).
    pub fn horizontal_range_to(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Bearing to another position in radians (0 = North, clockwise).
    pub fn bearing_to(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx.atan2(dy).rem_euclid(TAU)
    }

    /// Point `distance` meters away along compass `bearing`, same depth.
    pub fn offset(&self, bearing: f64, distance: f64) -> Position {
        Position {
            x: self.x + bearing.sin() * distance,
            y: self.y + bearing.cos() * distance,
            depth: self.depth,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.depth.is_finite()
    }
}

impl SimTime {
    /// Advance by one tick of `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        self.tick += 1;
        self.elapsed_secs += dt;
    }
}

/// Normalize a compass angle into `[0, 2π)`.
pub fn wrap_bearing(angle: f64) -> f64 {
    angle.rem_euclid(TAU)
}

/// Signed shortest difference `to - from`, in `(-π, π]`.
pub fn angle_diff(from: f64, to: f64) -> f64 {
    let d = (to - from).rem_euclid(TAU);
    if d > PI {
        d - TAU
    } else {
        d
    }
}

/// Turn `current` toward `target` along the shorter arc by at most `max_step`.
pub fn step_angle_toward(current: f64, target: f64, max_step: f64) -> f64 {
    let err = angle_diff(current, target);
    if err.abs() <= max_step {
        wrap_bearing(target)
    } else {
        wrap_bearing(current + max_step.copysign(err))
    }
}

/// Move `current` toward `target` by at most `max_step`.
pub fn step_toward(current: f64, target: f64, max_step: f64) -> f64 {
    let err = target - current;
    if err.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(err)
    }
}
