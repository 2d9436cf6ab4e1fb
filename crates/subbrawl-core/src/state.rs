//! Read-only world snapshots built at the end of every tick.
//!
//! Views are sorted by entity id so identical worlds serialize identically.

use serde::{Deserialize, Serialize};

use crate::components::Refuel;
use crate::config::{Objective, Ring};
use crate::enums::GuidanceState;
use crate::types::{AccountId, EntityId, Position, SimTime};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmarineView {
    pub id: EntityId,
    pub owner: AccountId,
    pub position: Position,
    pub heading: f64,
    pub target_heading: Option<f64>,
    pub speed: f64,
    pub target_speed: f64,
    pub target_depth: Option<f64>,
    pub throttle: f64,
    pub rudder: f64,
    pub planes: f64,
    pub battery: f64,
    pub fuel: f64,
    pub health: f64,
    pub snorkeling: bool,
    pub blowing: bool,
    pub blow_charge: f64,
    pub passive_array_bearing: f64,
    pub tubes_loaded: u32,
    pub kills: u32,
    pub score: f64,
    pub refuel: Option<Refuel>,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorpedoView {
    pub id: EntityId,
    pub owner: AccountId,
    pub parent: EntityId,
    pub position: Position,
    pub heading: f64,
    pub target_heading: Option<f64>,
    pub speed: f64,
    pub target_speed: f64,
    pub target_depth: Option<f64>,
    pub battery: f64,
    pub guidance: GuidanceState,
    pub wire_connected: bool,
    pub active_sonar: bool,
    pub passive_sonar: bool,
    /// Strongest bearing the seeker heard this tick.
    pub passive_bearing: Option<f64>,
    pub lifetime_secs: f64,
    pub armed: bool,
    pub wire_range: f64,
}

/// Fuelers sit on the surface in plain sight of every account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelerView {
    pub id: EntityId,
    pub owner: AccountId,
    pub position: Position,
    pub fuel: f64,
    pub capacity: f64,
}

/// Complete world state at the end of a tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub time: SimTime,
    pub submarines: Vec<SubmarineView>,
    pub torpedoes: Vec<TorpedoView>,
    pub fuelers: Vec<FuelerView>,
}

impl WorldSnapshot {
    /// Copy restricted to the submarines and torpedoes `account` owns.
    /// Fuelers are public and always included.
    pub fn scoped_to(&self, account: AccountId) -> WorldSnapshot {
        WorldSnapshot {
            time: self.time,
            submarines: self
                .submarines
                .iter()
                .filter(|s| s.owner == account)
                .cloned()
                .collect(),
            torpedoes: self
                .torpedoes
                .iter()
                .filter(|t| t.owner == account)
                .cloned()
                .collect(),
            fuelers: self.fuelers.clone(),
        }
    }

    pub fn submarine(&self, id: EntityId) -> Option<&SubmarineView> {
        self.submarines.iter().find(|s| s.id == id)
    }

    pub fn torpedo(&self, id: EntityId) -> Option<&TorpedoView> {
        self.torpedoes.iter().find(|t| t.id == id)
    }

    pub fn fueler(&self, id: EntityId) -> Option<&FuelerView> {
        self.fuelers.iter().find(|f| f.id == id)
    }
}

/// Static map layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldLayout {
    pub ring: Ring,
    pub objectives: Vec<Objective>,
}
