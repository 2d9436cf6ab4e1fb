//! Events emitted by the simulation and routed to subscribers.

use serde::{Deserialize, Serialize};

use crate::enums::*;
use crate::types::{AccountId, EntityId, Position};

/// One active sonar return. Target identity is never revealed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    /// Absolute compass bearing (radians), with quality-scaled noise.
    pub bearing: f64,
    /// Bearing relative to the pinger's heading, in `(-π, π]`.
    pub bearing_relative: f64,
    pub range: f64,
    pub estimated_depth: f64,
    /// `(0, 1)`; falls with range and toward the beam edge.
    pub quality: f64,
}

/// Something a submarine's passive array heard this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassiveContact {
    pub observer_id: EntityId,
    pub bearing: f64,
    pub bearing_relative: f64,
    pub range_class: RangeClass,
    pub snr: f64,
    pub kind: ContactKind,
}

/// A hazard cloud edge picked up by the weather scanner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudContact {
    /// Absolute compass bearing toward the cloud center, with noise.
    pub bearing: f64,
    /// Distance to the nearest edge, with noise.
    pub range: f64,
    pub approx_radius: f64,
    pub depth_band: [f64; 2],
}

/// A submarine caught inside a blast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlastVictim {
    pub sub_id: EntityId,
    pub owner: AccountId,
    pub distance: f64,
    pub damage: f64,
    /// This hit took the hull to zero.
    pub destroyed: bool,
}

/// Simulation events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimEvent {
    PassiveContact(PassiveContact),
    /// Return from an active ping ordered by the submarine's owner.
    ActiveEcho { observer_id: EntityId, echo: Echo },
    /// Passive contact picked up by a torpedo's own seeker.
    TorpedoContact {
        torpedo_id: EntityId,
        bearing: f64,
        bearing_relative: f64,
        range_class: RangeClass,
        snr: f64,
    },
    /// Result of a torpedo self-ping, manual or homing.
    TorpedoPingResult {
        torpedo_id: EntityId,
        echoes: Vec<Echo>,
    },
    /// Victims are sorted by ascending distance.
    Explosion {
        torpedo_id: EntityId,
        owner: AccountId,
        at: Position,
        blast_radius: f64,
        victims: Vec<BlastVictim>,
    },
    SubmarineLost { sub_id: EntityId, cause: LossCause },
    RefuelEnded {
        sub_id: EntityId,
        fueler_id: EntityId,
        /// Diesel aboard when the transfer stopped.
        fuel: f64,
        reason: RefuelEnd,
    },
}

/// An event stamped with its tick and the accounts it is addressed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub tick: u64,
    pub recipients: Vec<AccountId>,
    pub event: SimEvent,
}

impl EventEnvelope {
    pub fn to(tick: u64, recipient: AccountId, event: SimEvent) -> Self {
        Self {
            tick,
            recipients: vec![recipient],
            event,
        }
    }

    pub fn is_for(&self, account: AccountId) -> bool {
        self.recipients.contains(&account)
    }
}
