//! Core types and definitions for the subbrawl simulation.
//!
//! This crate defines the vocabulary shared across all other crates:
//! components, commands, events, snapshots, errors and the tuning config.
//! It has no dependency on any runtime framework.

pub mod commands;
pub mod components;
pub mod config;
pub mod enums;
pub mod errors;
pub mod events;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
