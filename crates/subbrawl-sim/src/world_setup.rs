//! Entity construction: spawn placement and component bundles.

use std::f64::consts::TAU;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use subbrawl_core::components::{Battery, Fueler, Motion, Owner, Submarine, Torpedo};
use subbrawl_core::config::{FuelerConfig, GameConfig, WorldConfig};
use subbrawl_core::enums::GuidanceState;
use subbrawl_core::types::{AccountId, EntityId, Position};

use crate::systems::weather::Weather;

/// Attempts at finding a spawn point clear of other submarines.
const SPAWN_ATTEMPTS: usize = 30;

/// Pick a point in the spawn annulus, preferring one at least
/// `safe_spawn_separation` from every existing submarine. Falls back to the
/// last candidate when the ring is crowded.
pub fn pick_spawn_point(
    rng: &mut ChaCha8Rng,
    world: &WorldConfig,
    depth: f64,
    occupied: &[Position],
) -> Position {
    let min_sep_sq = world.safe_spawn_separation * world.safe_spawn_separation;
    let mut candidate = Position::new(world.ring.x, world.ring.y, depth);

    for _ in 0..SPAWN_ATTEMPTS {
        let bearing = rng.gen_range(0.0..TAU);
        let radius = if world.spawn_max_r > world.spawn_min_r {
            rng.gen_range(world.spawn_min_r..world.spawn_max_r)
        } else {
            world.spawn_min_r
        };
        candidate = Position::new(world.ring.x, world.ring.y, depth).offset(bearing, radius);

        let clear = occupied.iter().all(|p| {
            let dx = p.x - candidate.x;
            let dy = p.y - candidate.y;
            dx * dx + dy * dy >= min_sep_sq
        });
        if clear {
            break;
        }
    }
    candidate
}

pub(crate) fn uniform(rng: &mut ChaCha8Rng, range: [f64; 2]) -> f64 {
    if range[1] > range[0] {
        rng.gen_range(range[0]..range[1])
    } else {
        range[0]
    }
}

/// Components for a newly commissioned submarine.
pub fn submarine_bundle(
    id: EntityId,
    owner: AccountId,
    rng: &mut ChaCha8Rng,
    config: &GameConfig,
    occupied: &[Position],
) -> (EntityId, Owner, Position, Motion, Battery, Submarine) {
    let depth = uniform(rng, config.sub.spawn_depth);
    let position = pick_spawn_point(rng, &config.world, depth, occupied);
    let heading = rng.gen_range(0.0..TAU);
    let battery = uniform(rng, config.sub.battery.initial);

    (
        id,
        Owner(owner),
        position,
        Motion {
            heading,
            target_heading: Some(heading),
            speed: 0.0,
            target_speed: 0.0,
            target_depth: Some(depth),
        },
        Battery(battery),
        Submarine {
            throttle: 0.0,
            rudder: 0.0,
            planes: 0.0,
            health: 100.0,
            fuel: config.sub.battery.initial_fuel.min(config.sub.battery.max_fuel),
            snorkeling: false,
            blow_remaining_secs: 0.0,
            blow_charge: 1.0,
            passive_array_bearing: heading,
            tubes_loaded: config.torpedo.magazine_size,
            ping_cooldown_secs: 0.0,
            kills: 0,
            score: 0.0,
            refuel: None,
            scanner_noise_secs: 0.0,
            destroyed: false,
        },
    )
}

/// Pick a surface point for a fueler `spawn_range` away from `near`,
/// clear of hazard clouds. Falls back to the caller's own spot when every
/// attempt lands in a cloud.
pub fn pick_fueler_point(
    rng: &mut ChaCha8Rng,
    near: &Position,
    cfg: &FuelerConfig,
    weather: &Weather,
) -> Position {
    let origin = Position::new(near.x, near.y, 0.0);
    for _ in 0..cfg.spawn_attempts {
        let bearing = rng.gen_range(0.0..TAU);
        let candidate = origin.offset(bearing, uniform(rng, cfg.spawn_range));
        if weather.surface_clear(candidate.x, candidate.y) {
            return candidate;
        }
    }
    origin
}

/// Components for a fueler summoned by `owner` near `near`.
pub fn fueler_bundle(
    id: EntityId,
    owner: AccountId,
    near: &Position,
    rng: &mut ChaCha8Rng,
    config: &GameConfig,
    weather: &Weather,
) -> (EntityId, Owner, Position, Fueler) {
    let position = pick_fueler_point(rng, near, &config.fueler, weather);
    let capacity = config.sub.battery.max_fuel * config.fueler.capacity_fraction;
    (
        id,
        Owner(owner),
        position,
        Fueler {
            fuel: capacity,
            capacity,
            age_secs: 0.0,
            used_secs: None,
        },
    )
}

/// Components for a torpedo leaving the tube of `parent`.
pub fn torpedo_bundle(
    id: EntityId,
    owner: AccountId,
    parent: EntityId,
    launch_point: Position,
    heading: f64,
    wire_range: f64,
    config: &GameConfig,
) -> (EntityId, Owner, Position, Motion, Battery, Torpedo) {
    let torp = &config.torpedo;
    (
        id,
        Owner(owner),
        launch_point,
        Motion {
            heading,
            target_heading: Some(heading),
            speed: torp.initial_speed,
            target_speed: torp.initial_speed,
            target_depth: Some(launch_point.depth),
        },
        Battery(torp.battery.capacity),
        Torpedo {
            parent,
            launch_point,
            wire_range,
            guidance: GuidanceState::WireGuided,
            wire_connected: true,
            active_sonar: false,
            passive_sonar: true,
            lifetime_secs: torp.lifetime_s,
            age_secs: 0.0,
            armed: false,
            next_ping_secs: 0.0,
            passive_bearing: None,
        },
    )
}
