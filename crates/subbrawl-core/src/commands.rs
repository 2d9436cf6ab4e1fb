//! Commands submitted by clients and the synchronous results they produce.
//!
//! Commands are checked for malformed input before they are queued, then
//! applied at the next tick boundary. Angle fields are compass degrees.

use serde::{Deserialize, Serialize};

use crate::enums::GuidanceState;
use crate::errors::CommandError;
use crate::events::{CloudContact, Echo};
use crate::types::{EntityId, Position};

/// All possible player actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    // --- Lifecycle ---
    /// Spawn a new submarine for the issuing account.
    RegisterSubmarine,

    // --- Helm ---
    /// Set any subset of the helm controls.
    Control {
        sub_id: EntityId,
        #[serde(default)]
        throttle: Option<f64>,
        #[serde(default)]
        planes: Option<f64>,
        #[serde(default)]
        rudder_deg: Option<f64>,
        #[serde(default)]
        rudder_nudge_deg: Option<f64>,
        #[serde(default)]
        target_depth: Option<f64>,
    },
    /// Absolute autopilot heading.
    SetHeading { sub_id: EntityId, heading_deg: f64 },
    /// Autopilot heading relative to the current heading.
    TurnSubmarine { sub_id: EntityId, turn_deg: f64 },
    /// Raise or lower the snorkel; toggles when `on` is absent.
    Snorkel {
        sub_id: EntityId,
        #[serde(default)]
        on: Option<bool>,
    },
    EmergencyBlow { sub_id: EntityId },

    // --- Sensors ---
    SteerPassiveArray { sub_id: EntityId, bearing_deg: f64 },
    Ping {
        sub_id: EntityId,
        #[serde(default)]
        beam_deg: Option<f64>,
        #[serde(default)]
        max_range: Option<f64>,
        #[serde(default)]
        bearing_offset_deg: Option<f64>,
    },

    // --- Weapons ---
    LaunchTorpedo {
        sub_id: EntityId,
        #[serde(default)]
        range: Option<f64>,
    },
    ReloadTubes {
        sub_id: EntityId,
        #[serde(default)]
        count: Option<u32>,
    },
    SetTorpedoSpeed { torpedo_id: EntityId, speed: f64 },
    SetTorpedoDepth { torpedo_id: EntityId, depth: f64 },
    SetTorpedoHeading { torpedo_id: EntityId, heading_deg: f64 },
    /// Switch torpedo sensors. With neither field given the active sonar
    /// toggles; otherwise only the given fields are set.
    SetTorpedoSonar {
        torpedo_id: EntityId,
        #[serde(default)]
        active: Option<bool>,
        #[serde(default)]
        passive: Option<bool>,
    },
    TorpedoPing {
        torpedo_id: EntityId,
        #[serde(default)]
        max_range: Option<f64>,
    },
    Detonate { torpedo_id: EntityId },

    // --- Logistics ---
    /// Sweep nearby hazard clouds. Costs battery and makes the hull loud.
    WeatherScan { sub_id: EntityId },
    /// Summon a fueler near the submarine; one per account at a time.
    CallFueler { sub_id: EntityId },
    /// Moor alongside a fueler within rendezvous range and take on diesel.
    StartRefuel { sub_id: EntityId },
}

fn finite(field: &'static str, value: f64) -> Result<(), CommandError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CommandError::validation(field, "must be a finite number"))
    }
}

fn finite_opt(field: &'static str, value: Option<f64>) -> Result<(), CommandError> {
    value.map_or(Ok(()), |v| finite(field, v))
}

fn positive_opt(field: &'static str, value: Option<f64>) -> Result<(), CommandError> {
    match value {
        Some(v) if !(v.is_finite() && v > 0.0) => {
            Err(CommandError::validation(field, "must be a positive number"))
        }
        _ => Ok(()),
    }
}

impl Command {
    /// Reject malformed input before it reaches the tick loop.
    ///
    /// Only checks what can be judged without world state; clamping to
    /// tuning limits happens when the command is applied.
    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            Command::RegisterSubmarine
            | Command::Snorkel { .. }
            | Command::EmergencyBlow { .. }
            | Command::Detonate { .. }
            | Command::WeatherScan { .. }
            | Command::CallFueler { .. }
            | Command::StartRefuel { .. } => Ok(()),
            Command::Control {
                throttle,
                planes,
                rudder_deg,
                rudder_nudge_deg,
                target_depth,
                ..
            } => {
                finite_opt("throttle", *throttle)?;
                finite_opt("planes", *planes)?;
                finite_opt("rudder_deg", *rudder_deg)?;
                finite_opt("rudder_nudge_deg", *rudder_nudge_deg)?;
                finite_opt("target_depth", *target_depth)
            }
            Command::SetHeading { heading_deg, .. } => finite("heading_deg", *heading_deg),
            Command::TurnSubmarine { turn_deg, .. } => finite("turn_deg", *turn_deg),
            Command::SteerPassiveArray { bearing_deg, .. } => finite("bearing_deg", *bearing_deg),
            Command::Ping {
                beam_deg,
                max_range,
                bearing_offset_deg,
                ..
            } => {
                positive_opt("beam_deg", *beam_deg)?;
                positive_opt("max_range", *max_range)?;
                finite_opt("bearing_offset_deg", *bearing_offset_deg)
            }
            Command::LaunchTorpedo { range, .. } => positive_opt("range", *range),
            Command::ReloadTubes { count, .. } => match count {
                Some(0) => Err(CommandError::validation("count", "must be at least 1")),
                _ => Ok(()),
            },
            Command::SetTorpedoSpeed { speed, .. } => finite("speed", *speed),
            Command::SetTorpedoDepth { depth, .. } => finite("depth", *depth),
            Command::SetTorpedoHeading { heading_deg, .. } => finite("heading_deg", *heading_deg),
            Command::SetTorpedoSonar { .. } => Ok(()),
            Command::TorpedoPing { max_range, .. } => positive_opt("max_range", *max_range),
        }
    }
}

/// Battery cost of an active ping, itemized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PingCost {
    pub base: f64,
    pub angle: f64,
    pub range: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingReport {
    pub cost: PingCost,
    pub battery_remaining: f64,
    pub beam_deg: f64,
    pub max_range: f64,
    pub echoes: Vec<Echo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub battery_cost: f64,
    pub battery_remaining: f64,
    pub max_range: f64,
    pub clouds: Vec<CloudContact>,
}

/// Synchronous result of an applied command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommandOutcome {
    Registered {
        sub_id: EntityId,
        spawn: Position,
    },
    Ack,
    Heading {
        heading: f64,
        target_heading: f64,
    },
    Snorkel {
        snorkeling: bool,
        depth: f64,
        limit: f64,
    },
    Ping(PingReport),
    Launched {
        torpedo_id: EntityId,
        range: f64,
        battery_cost: f64,
        spawn: Position,
        tubes_loaded: u32,
    },
    Reloaded {
        reloaded: u32,
        battery_cost: f64,
        battery_remaining: f64,
        tubes_loaded: u32,
    },
    TorpedoOrder {
        target_heading: Option<f64>,
        target_speed: f64,
        target_depth: Option<f64>,
    },
    TorpedoSonar {
        active: bool,
        passive: bool,
        guidance: GuidanceState,
    },
    TorpedoPing {
        echoes: Vec<Echo>,
        battery_remaining: f64,
    },
    Detonating {
        torpedo_id: EntityId,
        at: Position,
    },
    WeatherScan(ScanReport),
    FuelerCalled {
        fueler_id: EntityId,
        position: Position,
        fuel: f64,
    },
    RefuelStarted {
        fueler_id: EntityId,
        distance: f64,
        /// Time alongside before fuel starts to flow.
        warmup_secs: f64,
    },
}
