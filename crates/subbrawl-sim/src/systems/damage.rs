//! Damage system: resolves detonations into blast damage, kills and losses.
//!
//! Every detonation produces exactly one `Explosion` event, even when the
//! blast touches nobody. Destroyed hulls stay in the world, flagged, until
//! the next tick boundary so same-tick events can still reference them.

use hecs::{Entity, World};
use tracing::info;

use subbrawl_core::components::{Owner, Submarine};
use subbrawl_core::config::{GameConfig, TorpedoConfig};
use subbrawl_core::enums::LossCause;
use subbrawl_core::events::{BlastVictim, EventEnvelope, SimEvent};
use subbrawl_core::types::{AccountId, EntityId, Position};

/// A torpedo going off, queued for this tick's damage pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detonation {
    pub torpedo_id: EntityId,
    pub owner: AccountId,
    /// Launching submarine, credited with any kill.
    pub parent: EntityId,
    pub at: Position,
}

/// Damage at `distance` from the blast center.
///
/// Full damage inside the lethal radius, falling linearly to zero at the
/// blast radius.
pub fn blast_damage(cfg: &TorpedoConfig, distance: f64) -> f64 {
    if distance >= cfg.blast_radius {
        0.0
    } else if distance <= cfg.lethal_radius {
        cfg.max_damage
    } else {
        cfg.max_damage * (cfg.blast_radius - distance) / (cfg.blast_radius - cfg.lethal_radius)
    }
}

/// Resolve every queued detonation, in order.
pub fn run(
    world: &mut World,
    config: &GameConfig,
    tick: u64,
    detonations: &mut Vec<Detonation>,
    events: &mut Vec<EventEnvelope>,
) {
    for det in detonations.drain(..) {
        resolve(world, config, tick, det, events);
    }
}

fn resolve(
    world: &mut World,
    config: &GameConfig,
    tick: u64,
    det: Detonation,
    events: &mut Vec<EventEnvelope>,
) {
    let cfg = &config.torpedo;

    let mut hits: Vec<(Entity, EntityId, AccountId, f64, f64)> = world
        .query::<(&EntityId, &Owner, &Position, &Submarine)>()
        .iter()
        .filter(|(_, (_, _, _, sub))| !sub.destroyed)
        .filter_map(|(entity, (id, owner, pos, _))| {
            let distance = det.at.range_to(pos);
            let damage = blast_damage(cfg, distance);
            (damage > 0.0).then_some((entity, *id, owner.0, distance, damage))
        })
        .collect();
    hits.sort_by(|a, b| a.3.total_cmp(&b.3).then(a.1.cmp(&b.1)));

    let mut victims = Vec::with_capacity(hits.len());
    let mut kills = 0u32;
    for (entity, sub_id, owner, distance, damage) in hits {
        let mut destroyed = false;
        if let Ok(mut sub) = world.get::<&mut Submarine>(entity) {
            sub.health = (sub.health - damage).max(0.0);
            if sub.health <= 0.0 {
                sub.destroyed = true;
                destroyed = true;
            }
        }
        if destroyed {
            info!(sub_id = sub_id.0, torpedo_id = det.torpedo_id.0, "submarine destroyed");
            events.push(EventEnvelope::to(
                tick,
                owner,
                SimEvent::SubmarineLost {
                    sub_id,
                    cause: LossCause::Torpedo,
                },
            ));
            if owner != det.owner {
                kills += 1;
            }
        }
        victims.push(BlastVictim {
            sub_id,
            owner,
            distance,
            damage,
            destroyed,
        });
    }

    if kills > 0 {
        credit_kills(world, config, det, kills);
    }

    let mut recipients: Vec<AccountId> = std::iter::once(det.owner)
        .chain(victims.iter().map(|v| v.owner))
        .collect();
    recipients.sort();
    recipients.dedup();

    events.push(EventEnvelope {
        tick,
        recipients,
        event: SimEvent::Explosion {
            torpedo_id: det.torpedo_id,
            owner: det.owner,
            at: det.at,
            blast_radius: cfg.blast_radius,
            victims,
        },
    });
}

/// Credit the launching submarine, or failing that the owner's
/// lowest-numbered surviving hull.
fn credit_kills(world: &mut World, config: &GameConfig, det: Detonation, kills: u32) {
    let mut candidates: Vec<(EntityId, Entity)> = world
        .query::<(&EntityId, &Owner, &Submarine)>()
        .iter()
        .filter(|(_, (_, owner, sub))| owner.0 == det.owner && !sub.destroyed)
        .map(|(entity, (id, _, _))| (*id, entity))
        .collect();
    candidates.sort_by_key(|(id, _)| *id);

    let credited = candidates
        .iter()
        .find(|(id, _)| *id == det.parent)
        .or_else(|| candidates.first());
    if let Some((id, entity)) = credited {
        if let Ok(mut sub) = world.get::<&mut Submarine>(*entity) {
            sub.kills += kills;
            sub.score += config.sub.kill_score * kills as f64;
        }
        info!(sub_id = id.0, kills, "kill credited");
    }
}

/// Flag hulls whose health ran out outside a blast, blaming `cause`.
pub fn mark_losses(
    world: &mut World,
    tick: u64,
    cause: LossCause,
    events: &mut Vec<EventEnvelope>,
) {
    let mut lost: Vec<(EntityId, AccountId)> = Vec::new();
    for (_entity, (id, owner, sub)) in world.query_mut::<(&EntityId, &Owner, &mut Submarine)>() {
        if !sub.destroyed && sub.health <= 0.0 {
            sub.destroyed = true;
            lost.push((*id, owner.0));
        }
    }
    lost.sort();
    for (sub_id, owner) in lost {
        info!(sub_id = sub_id.0, ?cause, "submarine lost");
        events.push(EventEnvelope::to(
            tick,
            owner,
            SimEvent::SubmarineLost { sub_id, cause },
        ));
    }
}
