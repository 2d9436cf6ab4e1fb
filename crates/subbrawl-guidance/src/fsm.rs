//! Torpedo guidance finite state machine.
//!
//! Pure functions that compute guidance transitions for one torpedo from a
//! plain-data view of its situation. No ECS dependency.
//!
//! ```text
//! WireGuided --wire parts--> Autonomous
//! WireGuided | Autonomous --active sonar on--> Homing
//! Homing --active sonar off--> WireGuided | Autonomous
//! any live state --fuze / battery dead--> Detonated
//! any live state --lifetime / range--> Expired
//! ```

use subbrawl_core::enums::GuidanceState;

/// Input to the guidance FSM for a single torpedo.
#[derive(Debug, Clone, Copy)]
pub struct GuidanceContext {
    pub state: GuidanceState,
    pub wire_connected: bool,
    pub active_sonar: bool,
    pub lifetime_secs: f64,
    pub age_secs: f64,
    pub dt: f64,
    pub battery: f64,
    /// Distance to the launching submarine; `None` once it is gone or destroyed.
    pub parent_distance: Option<f64>,
    pub wire_range: f64,
    pub distance_from_launch: f64,
    pub max_range: f64,
    pub arming_delay_secs: f64,
    pub min_safe_distance: f64,
    pub fuze_radius: f64,
    /// Distance to the closest submarine of another account.
    pub nearest_hostile: Option<f64>,
}

/// Why a torpedo left the live states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    LifetimeElapsed,
    ProximityFuze,
    BatteryExhausted,
    RangeExceeded,
}

/// Output from the guidance FSM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceUpdate {
    pub state: GuidanceState,
    pub wire_connected: bool,
    pub lifetime_secs: f64,
    pub armed: bool,
    /// The wire parted during this evaluation.
    pub wire_severed: bool,
    pub termination: Option<Termination>,
}

impl GuidanceUpdate {
    pub fn changed_from(&self, ctx: &GuidanceContext) -> bool {
        self.state != ctx.state || self.wire_connected != ctx.wire_connected
    }
}

/// Guidance state implied by the sonar switch and wire status.
///
/// Terminal states are sticky.
pub fn state_for_sonar(current: GuidanceState, wire_connected: bool, active: bool) -> GuidanceState {
    if current.is_terminal() {
        return current;
    }
    match (active, wire_connected) {
        (true, _) => GuidanceState::Homing,
        (false, true) => GuidanceState::WireGuided,
        (false, false) => GuidanceState::Autonomous,
    }
}

/// Fuze condition: armed, a hostile inside the fuze radius, parent clear.
pub fn fuze_triggered(ctx: &GuidanceContext, armed: bool) -> bool {
    if !armed {
        return false;
    }
    let parent_clear = ctx
        .parent_distance
        .is_none_or(|d| d >= ctx.min_safe_distance);
    let hostile_close = ctx.nearest_hostile.is_some_and(|d| d <= ctx.fuze_radius);
    parent_clear && hostile_close
}

/// Evaluate the FSM for one torpedo for one tick.
pub fn evaluate(ctx: &GuidanceContext) -> GuidanceUpdate {
    let armed = ctx.age_secs >= ctx.arming_delay_secs;

    // Terminal states are final
    if ctx.state.is_terminal() {
        return GuidanceUpdate {
            state: ctx.state,
            wire_connected: ctx.wire_connected,
            lifetime_secs: ctx.lifetime_secs,
            armed,
            wire_severed: false,
            termination: None,
        };
    }

    let lifetime_secs = (ctx.lifetime_secs - ctx.dt).max(0.0);
    let terminate = |state, reason| GuidanceUpdate {
        state,
        wire_connected: false,
        lifetime_secs,
        armed,
        wire_severed: ctx.wire_connected,
        termination: Some(reason),
    };

    if lifetime_secs <= 0.0 {
        return terminate(GuidanceState::Expired, Termination::LifetimeElapsed);
    }
    if fuze_triggered(ctx, armed) {
        return terminate(GuidanceState::Detonated, Termination::ProximityFuze);
    }
    if ctx.battery <= 0.0 {
        return terminate(GuidanceState::Detonated, Termination::BatteryExhausted);
    }
    if ctx.distance_from_launch > ctx.max_range {
        return terminate(GuidanceState::Expired, Termination::RangeExceeded);
    }

    let wire_parts = ctx.wire_connected
        && ctx
            .parent_distance
            .is_none_or(|d| d > ctx.wire_range);
    let wire_connected = ctx.wire_connected && !wire_parts;

    GuidanceUpdate {
        state: state_for_sonar(ctx.state, wire_connected, ctx.active_sonar),
        wire_connected,
        lifetime_secs,
        armed,
        wire_severed: wire_parts,
        termination: None,
    }
}
