//! Error types shared by the simulation and its hosts.

use thiserror::Error;

use crate::enums::EntityKind;
use crate::types::EntityId;

/// Why a command was rejected. Rejected commands never change world state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },
    #[error("{kind} {id} belongs to another account")]
    Forbidden { kind: EntityKind, id: EntityId },
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),
    #[error("state conflict: {0}")]
    StateConflict(String),
    #[error("internal fault on {id}: {reason}")]
    InternalTickFault { id: EntityId, reason: String },
}

impl CommandError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        CommandError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        CommandError::StateConflict(reason.into())
    }

    pub fn capacity(reason: impl Into<String>) -> Self {
        CommandError::CapacityExceeded(reason.into())
    }
}

/// Failure loading the tuning document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
