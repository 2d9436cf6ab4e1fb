//! Simulation engine for SUBBRAWL.
//!
//! Owns the hecs ECS world, runs systems at a fixed tick rate,
//! and produces WorldSnapshots and routed events for the host.

pub mod commands;
pub mod engine;
pub mod store;
pub mod systems;
pub mod world_setup;

pub use subbrawl_core as core;
pub use engine::{SimConfig, SimulationEngine, TickReport};
