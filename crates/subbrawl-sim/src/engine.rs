//! Simulation engine: the authoritative world.
//!
//! `SimulationEngine` owns the hecs ECS world, applies player commands,
//! runs all systems, and produces `WorldSnapshot`s. Completely headless
//! (no threads, no I/O), enabling deterministic testing.
//!
//! A tick has three phases the host drives in order: `begin_tick` removes
//! what died last tick, `apply` runs each command with its own result, and
//! `step` advances the world. `tick` does all three from the internal queue.

use std::collections::VecDeque;

use hecs::World;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use subbrawl_core::commands::{Command, CommandOutcome};
use subbrawl_core::config::GameConfig;
use subbrawl_core::enums::LossCause;
use subbrawl_core::errors::CommandError;
use subbrawl_core::events::EventEnvelope;
use subbrawl_core::state::{WorldLayout, WorldSnapshot};
use subbrawl_core::types::{AccountId, EntityId, SimTime};

use crate::commands::{self, CommandContext};
use crate::store::EntityStore;
use crate::systems;
use crate::systems::damage::Detonation;
use crate::systems::weather::{Medium, Weather};

/// Configuration for starting a new simulation.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// RNG seed for determinism. Same seed = same simulation.
    pub seed: u64,
    pub game: GameConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            game: GameConfig::default(),
        }
    }
}

/// Everything one tick produced.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub snapshot: WorldSnapshot,
    /// Events in emission order, all stamped with this tick.
    pub events: Vec<EventEnvelope>,
    /// Entities whose physics step was rolled back this tick.
    pub faults: Vec<CommandError>,
    /// Entities removed at the start of this tick.
    pub removed: Vec<EntityId>,
    /// Commands applied since the previous step.
    pub commands_applied: usize,
    /// Commands rejected since the previous step.
    pub commands_rejected: usize,
}

/// The simulation engine. Owns the ECS world and all sim state.
pub struct SimulationEngine {
    store: EntityStore,
    config: GameConfig,
    weather: Weather,
    time: SimTime,
    rng: ChaCha8Rng,
    command_queue: VecDeque<(AccountId, Command)>,
    despawn_buffer: Vec<EntityId>,
    events: Vec<EventEnvelope>,
    detonations: Vec<Detonation>,
    snapshot: WorldSnapshot,
    commands_applied: usize,
    commands_rejected: usize,
}

impl SimulationEngine {
    /// Create a new simulation engine with the given config.
    pub fn new(config: SimConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let game = config.game;
        let weather = Weather::generate(&game.world.weather.clouds, &game.world.ring, &mut rng);
        Self {
            store: EntityStore::new(),
            config: game,
            weather,
            time: SimTime::default(),
            rng,
            command_queue: VecDeque::new(),
            despawn_buffer: Vec::new(),
            events: Vec::new(),
            detonations: Vec::new(),
            snapshot: WorldSnapshot::default(),
            commands_applied: 0,
            commands_rejected: 0,
        }
    }

    /// Queue a command for processing at the next tick boundary.
    pub fn queue_command(&mut self, issuer: AccountId, command: Command) {
        self.command_queue.push_back((issuer, command));
    }

    /// Queue multiple commands.
    pub fn queue_commands(&mut self, commands: impl IntoIterator<Item = (AccountId, Command)>) {
        self.command_queue.extend(commands);
    }

    /// Commands still waiting in the internal queue.
    pub fn queued(&self) -> usize {
        self.command_queue.len()
    }

    /// Remove hulls destroyed and torpedoes terminated during the previous tick.
    pub fn begin_tick(&mut self) -> &[EntityId] {
        systems::cleanup::run(&mut self.store, &self.config.fueler, &mut self.despawn_buffer);
        &self.despawn_buffer
    }

    /// Validate and apply one command against the current world.
    ///
    /// Effects belong to the tick about to be stepped; any events it emits
    /// are delivered with that tick's report.
    pub fn apply(
        &mut self,
        issuer: AccountId,
        command: Command,
    ) -> Result<CommandOutcome, CommandError> {
        let result = command.validate().and_then(|()| {
            let mut ctx = CommandContext {
                store: &mut self.store,
                config: &self.config,
                weather: &self.weather,
                rng: &mut self.rng,
                tick: self.time.tick + 1,
                events: &mut self.events,
                detonations: &mut self.detonations,
            };
            commands::apply(&mut ctx, issuer, command)
        });
        match &result {
            Ok(_) => self.commands_applied += 1,
            Err(error) => {
                self.commands_rejected += 1;
                debug!(account = issuer.0, %error, "command rejected");
            }
        }
        result
    }

    /// Advance the world by one tick and return what it produced.
    pub fn step(&mut self) -> TickReport {
        let tick = self.time.tick + 1;
        let dt = self.config.dt();
        let clouds = &self.config.world.weather.clouds;
        let ring = &self.config.world.ring;

        // 0. Grow the hazard field ahead of hulls heading out
        let hulls = systems::weather::hull_positions(self.store.world());
        self.weather.extend_frontier(&hulls, clouds, ring, &mut self.rng);

        let world = self.store.world_mut();
        let medium = Medium {
            weather: &self.weather,
            world: &self.config.world,
        };

        // 1. Physics integration
        let faults = systems::physics::run(world, &self.config, dt);
        // 2. Crush losses
        systems::damage::mark_losses(world, tick, LossCause::Crush, &mut self.events);
        // 3. Hazard clouds
        systems::weather::hazards(world, &self.weather, ring, dt);
        systems::damage::mark_losses(world, tick, LossCause::Weather, &mut self.events);
        // 4. Fuel transfer alongside fuelers
        systems::refuel::run(world, &self.config, tick, &mut self.events);
        // 5. Passive sonar (arrays and torpedo seekers)
        systems::sonar::passive::run(
            world,
            &self.config,
            &medium,
            &mut self.rng,
            tick,
            &mut self.events,
        );
        // 6. Guidance FSM, homing pings, fuzing
        systems::guidance::run(
            world,
            &self.config,
            &medium,
            &mut self.rng,
            tick,
            &mut self.detonations,
            &mut self.events,
        );
        // 7. Damage from this tick's detonations
        systems::damage::run(
            world,
            &self.config,
            tick,
            &mut self.detonations,
            &mut self.events,
        );

        self.time.advance(dt);
        self.snapshot = systems::snapshot::build_snapshot(self.store.world(), &self.time);

        TickReport {
            snapshot: self.snapshot.clone(),
            events: std::mem::take(&mut self.events),
            faults,
            removed: self.despawn_buffer.clone(),
            commands_applied: std::mem::take(&mut self.commands_applied),
            commands_rejected: std::mem::take(&mut self.commands_rejected),
        }
    }

    /// Run a full tick from the internal queue: cleanup, at most
    /// `max_commands_per_tick` commands, then the systems.
    pub fn tick(&mut self) -> TickReport {
        self.begin_tick();
        for _ in 0..self.config.max_commands_per_tick {
            let Some((issuer, command)) = self.command_queue.pop_front() else {
                break;
            };
            // Outcomes are tallied in the report; nobody is waiting on them here.
            let _ = self.apply(issuer, command);
        }
        self.step()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Get the current simulation time.
    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Snapshot built at the end of the last tick.
    pub fn snapshot(&self) -> &WorldSnapshot {
        &self.snapshot
    }

    /// Static ring and objectives.
    pub fn layout(&self) -> WorldLayout {
        WorldLayout {
            ring: self.config.world.ring,
            objectives: self.config.world.objectives.clone(),
        }
    }

    pub fn weather(&self) -> &Weather {
        &self.weather
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Get a read-only reference to the ECS world.
    pub fn world(&self) -> &World {
        self.store.world()
    }

    #[cfg(test)]
    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    #[cfg(test)]
    pub fn weather_mut(&mut self) -> &mut Weather {
        &mut self.weather
    }
}
