//! ECS components for hecs entities.
//!
//! Components are plain data structs with no methods.
//! Game logic lives in systems, not components.
//!
//! Submarines and torpedoes carry the shared physics contract: `EntityId`,
//! `Owner`, `Position` (from types.rs), `Motion` and `Battery`, plus exactly
//! one of `Submarine` or `Torpedo`. Fuelers are stationary and carry only
//! `EntityId`, `Owner`, `Position` and `Fueler`.

use serde::{Deserialize, Serialize};

use crate::enums::GuidanceState;
use crate::types::{AccountId, EntityId, Position};

/// Owning account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner(pub AccountId);

/// Kinematic state and the autopilot targets that drive it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    /// Compass heading in radians.
    pub heading: f64,
    /// Autopilot heading. `None` means manual rudder steering.
    pub target_heading: Option<f64>,
    /// Speed through the water (m/s).
    pub speed: f64,
    pub target_speed: f64,
    /// Depth hold. `None` means manual planes.
    pub target_depth: Option<f64>,
}

/// Charge in percent, `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Battery(pub f64);

/// Submarine-only state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Submarine {
    /// Commanded throttle `[0, 1]`.
    pub throttle: f64,
    /// Rudder as a fraction of max rudder, `[-1, 1]`; positive turns to starboard.
    pub rudder: f64,
    /// Dive planes `[-1, 1]`; positive dives.
    pub planes: f64,
    /// Hull integrity `[0, 100]`.
    pub health: f64,
    /// Diesel fuel for snorkel recharging.
    pub fuel: f64,
    pub snorkeling: bool,
    /// Seconds left on an emergency blow; zero when not blowing.
    pub blow_remaining_secs: f64,
    /// Compressed air available for a blow, `[0, 1]`.
    pub blow_charge: f64,
    /// Absolute compass bearing the passive array is steered to.
    pub passive_array_bearing: f64,
    pub tubes_loaded: u32,
    /// Seconds until the active sonar can ping again.
    pub ping_cooldown_secs: f64,
    pub kills: u32,
    pub score: f64,
    /// Active refuel alongside a fueler; propulsion is frozen meanwhile.
    pub refuel: Option<Refuel>,
    /// Seconds the hull stays loud after a weather scan.
    pub scanner_noise_secs: f64,
    /// Health hit zero this tick; the entity is removed at the next boundary.
    pub destroyed: bool,
}

/// Binding between a submarine and the fueler it refuels from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Refuel {
    pub fueler: EntityId,
    /// Time spent moored alongside; fuel flows once it passes the warmup.
    pub warmup_secs: f64,
}

/// Surface tanker state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fueler {
    pub fuel: f64,
    pub capacity: f64,
    pub age_secs: f64,
    /// Seconds since the first transfer, `None` until then.
    pub used_secs: Option<f64>,
}

/// Torpedo-only state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Torpedo {
    /// Launching submarine.
    pub parent: EntityId,
    pub launch_point: Position,
    /// Maximum distance from the parent before the wire parts.
    pub wire_range: f64,
    pub guidance: GuidanceState,
    pub wire_connected: bool,
    pub active_sonar: bool,
    pub passive_sonar: bool,
    /// Countdown to forced expiry.
    pub lifetime_secs: f64,
    pub age_secs: f64,
    pub armed: bool,
    /// Seconds until the next homing self-ping.
    pub next_ping_secs: f64,
    /// Bearing of the last passive contact, if any.
    pub passive_bearing: Option<f64>,
}
