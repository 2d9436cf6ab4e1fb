//! Enumeration types used throughout the simulation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Torpedo guidance phase.
///
/// `Detonated` and `Expired` are terminal: a torpedo in either state is
/// removed at the next tick boundary and never updated again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuidanceState {
    /// Steered by its owner over the wire.
    #[default]
    WireGuided,
    /// Wire severed; holds its last ordered heading, speed and depth.
    Autonomous,
    /// Active seeker on; re-steers toward the strongest echo of each self-ping.
    Homing,
    Detonated,
    Expired,
}

impl GuidanceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, GuidanceState::Detonated | GuidanceState::Expired)
    }
}

/// Coarse range bucket reported with passive contacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeClass {
    Short,
    Medium,
    Long,
}

impl RangeClass {
    /// Bucket a range against `[short_max, medium_max]` band edges.
    pub fn classify(range: f64, bands: [f64; 2]) -> Self {
        if range < bands[0] {
            RangeClass::Short
        } else if range < bands[1] {
            RangeClass::Medium
        } else {
            RangeClass::Long
        }
    }
}

/// What a passive contact heard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Submarine,
    Torpedo,
    /// A submarine venting ballast; very loud.
    EmergencyBlow,
    /// Someone else's active ping.
    ActivePing,
}

/// Entity class, used in error messages and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Submarine,
    Torpedo,
    Fueler,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Submarine => f.write_str("submarine"),
            EntityKind::Torpedo => f.write_str("torpedo"),
            EntityKind::Fueler => f.write_str("fueler"),
        }
    }
}

/// Why a submarine was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossCause {
    Torpedo,
    Crush,
    /// Hazard cloud outside the ring.
    Weather,
}

/// Why a refuel stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefuelEnd {
    TankFull,
    FuelerEmpty,
    /// Drifted out of range, lost the snorkel, or the fueler left.
    Interrupted,
}
