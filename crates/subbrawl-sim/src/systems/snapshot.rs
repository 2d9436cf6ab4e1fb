//! Snapshot system: queries the ECS world and builds a complete WorldSnapshot.
//!
//! Read-only; never modifies the world.

use hecs::World;

use subbrawl_core::components::*;
use subbrawl_core::state::{FuelerView, SubmarineView, TorpedoView, WorldSnapshot};
use subbrawl_core::types::{EntityId, Position, SimTime};

/// Build a complete WorldSnapshot from the current world state.
pub fn build_snapshot(world: &World, time: &SimTime) -> WorldSnapshot {
    WorldSnapshot {
        time: *time,
        submarines: build_submarines(world),
        torpedoes: build_torpedoes(world),
        fuelers: build_fuelers(world),
    }
}

/// Build SubmarineView list, including hulls destroyed this tick.
fn build_submarines(world: &World) -> Vec<SubmarineView> {
    let mut subs: Vec<SubmarineView> = world
        .query::<(&EntityId, &Owner, &Position, &Motion, &Battery, &Submarine)>()
        .iter()
        .map(|(_, (id, owner, pos, motion, battery, sub))| SubmarineView {
            id: *id,
            owner: owner.0,
            position: *pos,
            heading: motion.heading,
            target_heading: motion.target_heading,
            speed: motion.speed,
            target_speed: motion.target_speed,
            target_depth: motion.target_depth,
            throttle: sub.throttle,
            rudder: sub.rudder,
            planes: sub.planes,
            battery: battery.0,
            fuel: sub.fuel,
            health: sub.health,
            snorkeling: sub.snorkeling,
            blowing: sub.blow_remaining_secs > 0.0,
            blow_charge: sub.blow_charge,
            passive_array_bearing: sub.passive_array_bearing,
            tubes_loaded: sub.tubes_loaded,
            kills: sub.kills,
            score: sub.score,
            refuel: sub.refuel,
            destroyed: sub.destroyed,
        })
        .collect();

    subs.sort_by_key(|s| s.id);
    subs
}

/// Build TorpedoView list, including torpedoes that went terminal this tick.
fn build_torpedoes(world: &World) -> Vec<TorpedoView> {
    let mut torps: Vec<TorpedoView> = world
        .query::<(&EntityId, &Owner, &Position, &Motion, &Battery, &Torpedo)>()
        .iter()
        .map(|(_, (id, owner, pos, motion, battery, torp))| TorpedoView {
            id: *id,
            owner: owner.0,
            parent: torp.parent,
            position: *pos,
            heading: motion.heading,
            target_heading: motion.target_heading,
            speed: motion.speed,
            target_speed: motion.target_speed,
            target_depth: motion.target_depth,
            battery: battery.0,
            guidance: torp.guidance,
            wire_connected: torp.wire_connected,
            active_sonar: torp.active_sonar,
            passive_sonar: torp.passive_sonar,
            passive_bearing: torp.passive_bearing,
            lifetime_secs: torp.lifetime_secs,
            armed: torp.armed,
            wire_range: torp.wire_range,
        })
        .collect();

    torps.sort_by_key(|t| t.id);
    torps
}

fn build_fuelers(world: &World) -> Vec<FuelerView> {
    let mut fuelers: Vec<FuelerView> = world
        .query::<(&EntityId, &Owner, &Position, &Fueler)>()
        .iter()
        .map(|(_, (id, owner, pos, fueler))| FuelerView {
            id: *id,
            owner: owner.0,
            position: *pos,
            fuel: fueler.fuel,
            capacity: fueler.capacity,
        })
        .collect();

    fuelers.sort_by_key(|f| f.id);
    fuelers
}
