// Shared helpers for integration tests that run a live tick thread.
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use subbrawl_core::config::GameConfig;
use subbrawl_core::state::WorldSnapshot;
use subbrawl_server::{SimHandle, SimServer};
use subbrawl_sim::SimConfig;

// One-time guard so every test binary installs its log subscriber once.
static TRACING: OnceLock<()> = OnceLock::new();

pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

// Fast ticks keep tests short without changing the simulation itself.
pub fn fast_config() -> GameConfig {
    GameConfig {
        tick_hz: 50.0,
        ..Default::default()
    }
}

pub fn start(game: GameConfig) -> SimServer {
    init_tracing();
    SimServer::start(SimConfig { seed: 7, game }, 64).expect("server should start")
}

// Wait until the published snapshot reaches `tick`.
pub async fn wait_for_tick(handle: &SimHandle, tick: u64) -> Arc<WorldSnapshot> {
    let mut snapshots = handle.watch_snapshots();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let current = Arc::clone(&snapshots.borrow_and_update());
            if current.time.tick >= tick {
                return current;
            }
            snapshots.changed().await.expect("tick thread stopped early");
        }
    })
    .await
    .expect("tick did not arrive in time")
}
