//! ECS systems that operate on the simulation world each tick.
//!
//! Systems are free functions over `&mut World` (or `&World` for read-only
//! passes). They do not own state; all state lives in components.

pub mod cleanup;
pub mod damage;
pub mod guidance;
pub mod physics;
pub mod refuel;
pub mod snapshot;
pub mod sonar;
pub mod weather;
