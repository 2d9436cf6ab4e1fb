//! Guidance system: runs the torpedo FSM for every live torpedo, then
//! flies homing torpedoes from their own active pings.
//!
//! Calls the FSM from subbrawl-guidance to compute transitions, then
//! updates ECS components accordingly.

use hecs::{Entity, World};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use subbrawl_core::components::{Battery, Motion, Owner, Submarine, Torpedo};
use subbrawl_core::config::GameConfig;
use subbrawl_core::enums::GuidanceState;
use subbrawl_core::events::{Echo, EventEnvelope, SimEvent};
use subbrawl_core::types::{AccountId, EntityId, Position};

use subbrawl_guidance::fsm::{evaluate, GuidanceContext, GuidanceUpdate, Termination};

use crate::systems::damage::Detonation;
use crate::systems::sonar::active::{self, Beam, Reflector};
use crate::systems::weather::Medium;

/// One torpedo self-ping along its own heading.
///
/// The seeker rejects returns from hulls of its own account.
pub fn torpedo_ping(
    config: &GameConfig,
    owner: AccountId,
    origin: Position,
    heading: f64,
    max_range: f64,
    reflectors: &[Reflector],
    medium: &Medium,
    rng: &mut ChaCha8Rng,
) -> Vec<Echo> {
    let beam = Beam {
        origin,
        heading,
        center: heading,
        beam_deg: config.torpedo.sonar.active.beam_deg,
        max_range,
    };
    active::echoes(
        &config.sonar.active,
        &beam,
        reflectors.iter().filter(|r| r.owner != owner),
        medium,
        rng,
    )
}

/// Best echo to steer on, if any clears the quality floor.
pub fn homing_echo(echoes: &[Echo], min_quality: f64) -> Option<&Echo> {
    echoes
        .iter()
        .filter(|e| e.quality >= min_quality)
        .max_by(|a, b| a.quality.total_cmp(&b.quality))
}

struct Pending {
    entity: Entity,
    id: EntityId,
    owner: AccountId,
    parent: EntityId,
    at: Position,
    update: GuidanceUpdate,
}

/// Run the guidance system.
///
/// Detonations found here are appended to `detonations` for the damage
/// system later in the same tick.
pub fn run(
    world: &mut World,
    config: &GameConfig,
    medium: &Medium,
    rng: &mut ChaCha8Rng,
    tick: u64,
    detonations: &mut Vec<Detonation>,
    events: &mut Vec<EventEnvelope>,
) {
    let dt = config.dt();
    let torp_cfg = &config.torpedo;

    let subs: Vec<(EntityId, AccountId, Position)> = world
        .query::<(&EntityId, &Owner, &Position, &Submarine)>()
        .iter()
        .filter(|(_, (_, _, _, sub))| !sub.destroyed)
        .map(|(_, (id, owner, pos, _))| (*id, owner.0, *pos))
        .collect();

    // Collect updates in a buffer to avoid borrow issues with hecs
    let mut pending: Vec<Pending> = Vec::new();
    {
        let mut query = world.query::<(&EntityId, &Owner, &Position, &Battery, &Torpedo)>();
        for (entity, (id, owner, pos, battery, torp)) in query.iter() {
            if torp.guidance.is_terminal() {
                continue;
            }

            let parent_distance = subs
                .iter()
                .find(|(sid, _, _)| *sid == torp.parent)
                .map(|(_, _, p)| pos.range_to(p));
            let nearest_hostile = subs
                .iter()
                .filter(|(_, o, _)| *o != owner.0)
                .map(|(_, _, p)| pos.range_to(p))
                .min_by(f64::total_cmp);

            let ctx = GuidanceContext {
                state: torp.guidance,
                wire_connected: torp.wire_connected,
                active_sonar: torp.active_sonar,
                lifetime_secs: torp.lifetime_secs,
                age_secs: torp.age_secs,
                dt,
                battery: battery.0,
                parent_distance,
                wire_range: torp.wire_range,
                distance_from_launch: torp.launch_point.horizontal_range_to(pos),
                max_range: torp_cfg.max_range,
                arming_delay_secs: torp_cfg.arming_delay_s,
                min_safe_distance: torp_cfg.min_safe_distance,
                fuze_radius: torp_cfg.fuze_radius,
                nearest_hostile,
            };

            pending.push(Pending {
                entity,
                id: *id,
                owner: owner.0,
                parent: torp.parent,
                at: *pos,
                update: evaluate(&ctx),
            });
        }
    }

    // Apply updates
    for p in pending {
        let u = p.update;
        if let Ok(mut torp) = world.get::<&mut Torpedo>(p.entity) {
            torp.guidance = u.state;
            torp.wire_connected = u.wire_connected;
            torp.lifetime_secs = u.lifetime_secs;
            torp.armed = u.armed;
        }
        if u.wire_severed && u.termination.is_none() {
            info!(torpedo_id = p.id.0, "guidance wire severed");
        }
        let Some(reason) = u.termination else {
            continue;
        };
        if let Ok(mut motion) = world.get::<&mut Motion>(p.entity) {
            motion.speed = 0.0;
        }
        match reason {
            Termination::ProximityFuze | Termination::BatteryExhausted => {
                info!(torpedo_id = p.id.0, ?reason, "torpedo detonated");
                detonations.push(Detonation {
                    torpedo_id: p.id,
                    owner: p.owner,
                    parent: p.parent,
                    at: p.at,
                });
            }
            Termination::LifetimeElapsed | Termination::RangeExceeded => {
                info!(torpedo_id = p.id.0, ?reason, "torpedo expired");
            }
        }
    }

    // Homing self-pings
    let reflectors = active::reflectors(world, false);
    let seeker = &torp_cfg.sonar.active;
    let ping_cost = torp_cfg.battery.active_ping_cost;
    let min_charge = ping_cost.max(torp_cfg.battery.min_for_ping);

    for (_entity, (id, owner, pos, motion, battery, torp)) in world.query_mut::<(
        &EntityId,
        &Owner,
        &Position,
        &mut Motion,
        &mut Battery,
        &mut Torpedo,
    )>() {
        if torp.guidance != GuidanceState::Homing || !torp.active_sonar {
            continue;
        }
        torp.next_ping_secs -= dt;
        if torp.next_ping_secs > 0.0 {
            continue;
        }
        torp.next_ping_secs = seeker.ping_interval_s;
        if battery.0 < min_charge {
            continue;
        }
        battery.0 -= ping_cost;

        let echoes = torpedo_ping(
            config,
            owner.0,
            *pos,
            motion.heading,
            seeker.max_range,
            &reflectors,
            medium,
            rng,
        );
        if let Some(best) = homing_echo(&echoes, seeker.homing_min_quality) {
            motion.target_heading = Some(best.bearing);
        }
        events.push(EventEnvelope::to(
            tick,
            owner.0,
            SimEvent::TorpedoPingResult {
                torpedo_id: *id,
                echoes,
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(bearing: f64, quality: f64) -> Echo {
        Echo {
            bearing,
            bearing_relative: bearing,
            range: 500.0,
            estimated_depth: 100.0,
            quality,
        }
    }

    #[test]
    fn test_homing_picks_strongest_qualifying_echo() {
        let echoes = [echo(0.1, 0.3), echo(0.4, 0.9), echo(0.2, 0.5)];
        let best = homing_echo(&echoes, 0.2).map(|e| e.bearing);
        assert_eq!(best, Some(0.4));
    }

    #[test]
    fn test_homing_holds_without_qualifying_echo() {
        let echoes = [echo(0.1, 0.05), echo(0.4, 0.1)];
        assert!(homing_echo(&echoes, 0.2).is_none());
        assert!(homing_echo(&[], 0.2).is_none());
    }
}
