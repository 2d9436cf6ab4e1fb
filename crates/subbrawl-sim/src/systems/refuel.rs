//! Refuel system: diesel transfer from fuelers to moored submarines.
//!
//! A bound hull has to sit at snorkel depth within the rendezvous radius
//! for the warmup period before fuel flows. Drifting off, losing the
//! fueler, filling the tank or draining the fueler ends the refuel.

use hecs::{Entity, World};
use tracing::info;

use subbrawl_core::components::{Fueler, Owner, Refuel, Submarine};
use subbrawl_core::config::GameConfig;
use subbrawl_core::enums::RefuelEnd;
use subbrawl_core::events::{EventEnvelope, SimEvent};
use subbrawl_core::types::{AccountId, EntityId, Position};

/// Slack above snorkel depth that still counts as moored.
const DEPTH_SLACK: f64 = 0.5;

struct Station {
    entity: Entity,
    id: EntityId,
    pos: Position,
    fuel: f64,
    used: bool,
}

struct Moored {
    entity: Entity,
    id: EntityId,
    owner: AccountId,
    pos: Position,
    fuel: f64,
    refuel: Refuel,
}

/// Age every fueler, then advance each active refuel by one tick.
pub fn run(world: &mut World, config: &GameConfig, tick: u64, events: &mut Vec<EventEnvelope>) {
    let dt = config.dt();
    let max_fuel = config.sub.battery.max_fuel;
    let rate = config.sub.battery.refuel_rate_per_s;
    let cfg = &config.fueler;

    for (_entity, fueler) in world.query_mut::<&mut Fueler>() {
        fueler.age_secs += dt;
        if let Some(used) = fueler.used_secs.as_mut() {
            *used += dt;
        }
    }

    let mut stations: Vec<Station> = world
        .query::<(&EntityId, &Position, &Fueler)>()
        .iter()
        .map(|(entity, (id, pos, fueler))| Station {
            entity,
            id: *id,
            pos: *pos,
            fuel: fueler.fuel,
            used: false,
        })
        .collect();
    let mut moored: Vec<Moored> = world
        .query::<(&EntityId, &Owner, &Position, &Submarine)>()
        .iter()
        .filter(|(_, (_, _, _, sub))| !sub.destroyed)
        .filter_map(|(entity, (id, owner, pos, sub))| {
            sub.refuel.map(|refuel| Moored {
                entity,
                id: *id,
                owner: owner.0,
                pos: *pos,
                fuel: sub.fuel,
                refuel,
            })
        })
        .collect();
    moored.sort_by_key(|m| m.id);

    let mut ended: Vec<(usize, RefuelEnd)> = Vec::new();
    for (i, hull) in moored.iter_mut().enumerate() {
        let Some(station) = stations.iter_mut().find(|s| s.id == hull.refuel.fueler) else {
            ended.push((i, RefuelEnd::Interrupted));
            continue;
        };
        if hull.pos.range_to(&station.pos) > cfg.rendezvous_radius {
            ended.push((i, RefuelEnd::Interrupted));
            continue;
        }
        if hull.fuel >= max_fuel {
            ended.push((i, RefuelEnd::TankFull));
            continue;
        }
        if station.fuel <= 0.0 {
            ended.push((i, RefuelEnd::FuelerEmpty));
            continue;
        }
        if hull.pos.depth > config.sub.snorkel_depth + DEPTH_SLACK {
            continue;
        }

        hull.refuel.warmup_secs += dt;
        if hull.refuel.warmup_secs < cfg.warmup_s {
            continue;
        }

        let room = (max_fuel - hull.fuel).max(0.0);
        let amount = if rate > 0.0 {
            (rate * dt).min(station.fuel).min(room)
        } else {
            station.fuel.min(room)
        };
        if amount > 0.0 {
            hull.fuel += amount;
            station.fuel = (station.fuel - amount).max(0.0);
            station.used = true;
        }

        if hull.fuel >= max_fuel {
            ended.push((i, RefuelEnd::TankFull));
        } else if station.fuel <= 0.0 {
            ended.push((i, RefuelEnd::FuelerEmpty));
        }
    }

    for station in &stations {
        if let Ok(mut fueler) = world.get::<&mut Fueler>(station.entity) {
            fueler.fuel = station.fuel;
            if station.used && fueler.used_secs.is_none() {
                fueler.used_secs = Some(0.0);
            }
        }
    }

    for (i, hull) in moored.iter().enumerate() {
        let end = ended.iter().find(|(j, _)| *j == i).map(|(_, reason)| *reason);
        if let Ok(mut sub) = world.get::<&mut Submarine>(hull.entity) {
            sub.fuel = hull.fuel;
            sub.refuel = match end {
                Some(_) => None,
                None => Some(hull.refuel),
            };
        }
        let Some(reason) = end else {
            continue;
        };
        info!(sub_id = hull.id.0, fueler_id = hull.refuel.fueler.0, ?reason, "refuel ended");
        events.push(EventEnvelope::to(
            tick,
            hull.owner,
            SimEvent::RefuelEnded {
                sub_id: hull.id,
                fueler_id: hull.refuel.fueler,
                fuel: hull.fuel,
                reason,
            },
        ));
    }
}
