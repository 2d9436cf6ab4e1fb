//! Entity store: the hecs world plus a stable-id index.
//!
//! Systems operate on the raw `World`; command handling goes through the
//! store so ownership and liveness checks happen in one place.

use std::collections::HashMap;

use hecs::{Entity, World};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use subbrawl_core::components::{Battery, Fueler, Motion, Owner, Submarine, Torpedo};
use subbrawl_core::config::GameConfig;
use subbrawl_core::enums::EntityKind;
use subbrawl_core::errors::CommandError;
use subbrawl_core::types::{AccountId, EntityId, Position};

use crate::systems::weather::Weather;
use crate::world_setup;

/// Result of a successful torpedo launch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Launch {
    pub torpedo_id: EntityId,
    pub range: f64,
    pub battery_cost: f64,
    pub spawn: Position,
    pub tubes_loaded: u32,
}

#[derive(Default)]
pub struct EntityStore {
    world: World,
    index: HashMap<EntityId, Entity>,
    next_id: u64,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Number of live entities (submarines, torpedoes and fuelers).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.index.get(&id).copied()
    }

    fn allocate_id(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }

    /// Submarines of `account` that have not been destroyed.
    pub fn live_submarines_of(&self, account: AccountId) -> usize {
        self.world
            .query::<(&Owner, &Submarine)>()
            .iter()
            .filter(|(_, (owner, sub))| owner.0 == account && !sub.destroyed)
            .count()
    }

    fn submarine_positions(&self) -> Vec<Position> {
        self.world
            .query::<(&Position, &Submarine)>()
            .iter()
            .filter(|(_, (_, sub))| !sub.destroyed)
            .map(|(_, (pos, _))| *pos)
            .collect()
    }

    /// Commission a submarine for `owner` at a random safe spawn point.
    pub fn create_submarine(
        &mut self,
        owner: AccountId,
        config: &GameConfig,
        rng: &mut ChaCha8Rng,
    ) -> Result<(EntityId, Position), CommandError> {
        let owned = self.live_submarines_of(owner);
        if owned >= config.sub.max_per_user {
            return Err(CommandError::capacity(format!(
                "account already commands {owned} of {} submarines",
                config.sub.max_per_user
            )));
        }

        let occupied = self.submarine_positions();
        let id = self.allocate_id();
        let bundle = world_setup::submarine_bundle(id, owner, rng, config, &occupied);
        let spawn = bundle.2;
        let entity = self.world.spawn(bundle);
        self.index.insert(id, entity);

        info!(sub_id = id.0, account = owner.0, x = spawn.x, y = spawn.y, "submarine registered");
        Ok((id, spawn))
    }

    /// Summon a fueler near `sub_id`. An account may have one on station.
    pub fn create_fueler(
        &mut self,
        issuer: AccountId,
        sub_id: EntityId,
        config: &GameConfig,
        weather: &Weather,
        rng: &mut ChaCha8Rng,
    ) -> Result<(EntityId, Position, f64), CommandError> {
        let entity = self.submarine_for(sub_id, issuer)?;
        let on_station = self
            .world
            .query::<(&Owner, &Fueler)>()
            .iter()
            .any(|(_, (owner, _))| owner.0 == issuer);
        if on_station {
            return Err(CommandError::conflict("account already has a fueler on station"));
        }
        let near = self
            .world
            .get::<&Position>(entity)
            .map(|pos| *pos)
            .map_err(|_| CommandError::NotFound {
                kind: EntityKind::Submarine,
                id: sub_id,
            })?;

        let id = self.allocate_id();
        let bundle = world_setup::fueler_bundle(id, issuer, &near, rng, config, weather);
        let (position, fuel) = (bundle.2, bundle.3.fuel);
        let fueler = self.world.spawn(bundle);
        self.index.insert(id, fueler);

        info!(
            fueler_id = id.0,
            sub_id = sub_id.0,
            account = issuer.0,
            x = position.x,
            y = position.y,
            "fueler called"
        );
        Ok((id, position, fuel))
    }

    /// Fire a torpedo from `sub_id`. Costs one loaded tube and battery
    /// proportional to the ordered range.
    pub fn create_torpedo(
        &mut self,
        issuer: AccountId,
        sub_id: EntityId,
        range: Option<f64>,
        config: &GameConfig,
    ) -> Result<Launch, CommandError> {
        let entity = self.submarine_for(sub_id, issuer)?;
        let torp = &config.torpedo;
        let range = range.unwrap_or(torp.default_wire_range).min(torp.max_range);
        let cost = torp.launch_base_cost + torp.launch_cost_per_100m * range / 100.0;

        let (spawn, heading, tubes_loaded) = {
            let (pos, motion, battery, sub) = self
                .world
                .query_one_mut::<(&Position, &Motion, &mut Battery, &mut Submarine)>(entity)
                .map_err(|_| CommandError::NotFound {
                    kind: EntityKind::Submarine,
                    id: sub_id,
                })?;

            if sub.tubes_loaded == 0 {
                return Err(CommandError::capacity("no torpedoes loaded"));
            }
            if battery.0 < cost {
                return Err(CommandError::capacity(format!(
                    "battery {:.1}% below launch cost {cost:.1}%",
                    battery.0
                )));
            }
            battery.0 -= cost;
            sub.tubes_loaded -= 1;
            (
                pos.offset(motion.heading, torp.nose_offset),
                motion.heading,
                sub.tubes_loaded,
            )
        };

        let torpedo_id = self.allocate_id();
        let bundle =
            world_setup::torpedo_bundle(torpedo_id, issuer, sub_id, spawn, heading, range, config);
        let torpedo_entity = self.world.spawn(bundle);
        self.index.insert(torpedo_id, torpedo_entity);

        info!(
            torpedo_id = torpedo_id.0,
            sub_id = sub_id.0,
            account = issuer.0,
            range,
            "torpedo launched"
        );
        Ok(Launch {
            torpedo_id,
            range,
            battery_cost: cost,
            spawn,
            tubes_loaded,
        })
    }

    /// Resolve a live submarine the issuer is allowed to command.
    pub fn submarine_for(&self, id: EntityId, issuer: AccountId) -> Result<Entity, CommandError> {
        let not_found = || CommandError::NotFound {
            kind: EntityKind::Submarine,
            id,
        };
        let entity = self.entity(id).ok_or_else(not_found)?;
        let destroyed = match self.world.get::<&Submarine>(entity) {
            Ok(sub) => sub.destroyed,
            Err(_) => return Err(not_found()),
        };
        if destroyed {
            return Err(not_found());
        }
        self.check_owner(entity, issuer, EntityKind::Submarine, id)?;
        Ok(entity)
    }

    /// Resolve a torpedo the issuer is allowed to command.
    pub fn torpedo_for(&self, id: EntityId, issuer: AccountId) -> Result<Entity, CommandError> {
        let not_found = || CommandError::NotFound {
            kind: EntityKind::Torpedo,
            id,
        };
        let entity = self.entity(id).ok_or_else(not_found)?;
        if self.world.get::<&Torpedo>(entity).is_err() {
            return Err(not_found());
        }
        self.check_owner(entity, issuer, EntityKind::Torpedo, id)?;
        Ok(entity)
    }

    fn check_owner(
        &self,
        entity: Entity,
        issuer: AccountId,
        kind: EntityKind,
        id: EntityId,
    ) -> Result<(), CommandError> {
        match self.world.get::<&Owner>(entity) {
            Ok(owner) if owner.0 == issuer => Ok(()),
            Ok(_) => Err(CommandError::Forbidden { kind, id }),
            Err(_) => Err(CommandError::NotFound { kind, id }),
        }
    }

    /// Drop an entity from the world and the index.
    pub fn despawn(&mut self, id: EntityId) {
        if let Some(entity) = self.index.remove(&id) {
            let _ = self.world.despawn(entity);
        }
    }

    /// Place a submarine at an exact pose (tests only).
    #[cfg(test)]
    pub fn spawn_submarine_at(
        &mut self,
        owner: AccountId,
        position: Position,
        heading: f64,
        battery: f64,
        config: &GameConfig,
    ) -> EntityId {
        use rand::SeedableRng;

        let id = self.allocate_id();
        let mut rng = ChaCha8Rng::seed_from_u64(id.0);
        let mut bundle = world_setup::submarine_bundle(id, owner, &mut rng, config, &[]);
        bundle.2 = position;
        bundle.3 = Motion {
            heading,
            target_heading: Some(heading),
            speed: 0.0,
            target_speed: 0.0,
            target_depth: Some(position.depth),
        };
        bundle.4 = Battery(battery);
        bundle.5.passive_array_bearing = heading;
        let entity = self.world.spawn(bundle);
        self.index.insert(id, entity);
        id
    }
}
