use std::{env, path::PathBuf};

use subbrawl_core::config::GameConfig;
use subbrawl_core::errors::ConfigError;
use tracing::info;

// Runtime/server settings (not gameplay tuning).

pub const DEFAULT_CONFIG_PATH: &str = "game_config.json";
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

pub fn config_path() -> PathBuf {
    env::var("SUBBRAWL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn seed() -> u64 {
    env::var("SUBBRAWL_SEED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_SEED)
}

pub fn queue_capacity() -> usize {
    env::var("SUBBRAWL_QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_QUEUE_CAPACITY)
}

/// Tuning from the configured file, or the built-in defaults when the
/// file does not exist. A file that exists but fails to parse is an error.
pub fn load_game_config() -> Result<GameConfig, ConfigError> {
    let path = config_path();
    if path.exists() {
        info!(path = %path.display(), "loading game config");
        GameConfig::load(&path)
    } else {
        info!(path = %path.display(), "no config file, using defaults");
        Ok(GameConfig::default())
    }
}
