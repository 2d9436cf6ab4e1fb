use subbrawl_core::errors::{CommandError, ConfigError};
use thiserror::Error;

/// Why a request through a [`crate::SimHandle`] failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HandleError {
    /// The command queue is at capacity; the caller may retry.
    #[error("command queue is full")]
    QueueFull,
    #[error("simulation is not running")]
    Stopped,
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start tick thread: {0}")]
    Spawn(#[from] std::io::Error),
}
