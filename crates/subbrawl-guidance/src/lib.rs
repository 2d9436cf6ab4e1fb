//! Torpedo guidance logic for subbrawl.
//!
//! A pure state machine over plain data: the simulation gathers each
//! torpedo's situation into a `GuidanceContext`, calls `fsm::evaluate`,
//! and writes the `GuidanceUpdate` back into the world.

pub mod fsm;
