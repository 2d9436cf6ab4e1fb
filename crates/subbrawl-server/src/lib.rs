//! Runtime host for the SUBBRAWL simulation.
//!
//! Runs the engine on a dedicated tick thread behind a bounded command
//! queue, and fans snapshots and events out to independent subscribers.

pub mod broadcast;
pub mod error;
pub mod game_loop;
pub mod handle;
pub mod queue;
pub mod settings;

pub use broadcast::{Audience, Broadcaster, StreamRecord, Subscription};
pub use error::{HandleError, ServerError};
pub use game_loop::TickStats;
pub use handle::{SimHandle, SimServer};
