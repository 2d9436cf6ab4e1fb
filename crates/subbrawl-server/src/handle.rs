//! Query and command boundary of a running simulation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::watch;
use tracing::{error, info};

use subbrawl_core::commands::{Command, CommandOutcome};
use subbrawl_core::config::GameConfig;
use subbrawl_core::state::{WorldLayout, WorldSnapshot};
use subbrawl_core::types::AccountId;
use subbrawl_sim::{SimConfig, SimulationEngine};

use crate::broadcast::{Audience, Broadcaster, Subscription};
use crate::error::{HandleError, ServerError};
use crate::game_loop::{self, TickStats};
use crate::queue::CommandQueue;

/// Cloneable access to a running simulation. Reads are served from the
/// snapshot taken at the end of the most recent tick.
#[derive(Clone)]
pub struct SimHandle {
    commands: CommandQueue,
    snapshots: watch::Receiver<Arc<WorldSnapshot>>,
    broadcaster: Broadcaster,
    config: Arc<GameConfig>,
    layout: Arc<WorldLayout>,
}

impl SimHandle {
    /// Queue a command and wait for the tick that applies it.
    pub async fn execute(
        &self,
        issuer: AccountId,
        command: Command,
    ) -> Result<CommandOutcome, HandleError> {
        let reply = self.commands.submit(issuer, command)?;
        let outcome = reply.await.map_err(|_| HandleError::Stopped)??;
        Ok(outcome)
    }

    /// The caller's own entities.
    pub fn snapshot_for(&self, account: AccountId) -> WorldSnapshot {
        self.snapshots.borrow().scoped_to(account)
    }

    /// Every entity, for privileged callers.
    pub fn full_snapshot(&self) -> Arc<WorldSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// A receiver that changes once per tick.
    pub fn watch_snapshots(&self) -> watch::Receiver<Arc<WorldSnapshot>> {
        self.snapshots.clone()
    }

    pub fn layout(&self) -> &WorldLayout {
        &self.layout
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Open a stream with the configured mailbox size.
    pub fn subscribe(&self, audience: Audience) -> Subscription {
        self.broadcaster
            .subscribe(audience, self.config.stream.subscriber_queue_capacity)
    }
}

/// Owns the tick thread. Dropping it stops the simulation.
pub struct SimServer {
    handle: SimHandle,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<TickStats>>,
}

impl SimServer {
    pub fn start(config: SimConfig, queue_capacity: usize) -> Result<Self, ServerError> {
        config.game.validate()?;
        let seed = config.seed;
        let engine = SimulationEngine::new(config);
        let game = Arc::new(engine.config().clone());
        let layout = Arc::new(engine.layout());

        let (commands, receiver) = CommandQueue::bounded(queue_capacity);
        let (snapshot_tx, snapshots) = watch::channel(Arc::new(engine.snapshot().clone()));
        let broadcaster = Broadcaster::new();
        let running = Arc::new(AtomicBool::new(true));

        let thread = game_loop::spawn(
            engine,
            receiver,
            snapshot_tx,
            broadcaster.clone(),
            Arc::clone(&running),
        )?;
        info!(seed, queue_capacity, "simulation started");

        Ok(Self {
            handle: SimHandle {
                commands,
                snapshots,
                broadcaster,
                config: game,
                layout,
            },
            running,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }

    /// Stop the tick thread and return its counters. Blocks for at most
    /// about one tick period.
    pub fn shutdown(mut self) -> TickStats {
        self.stop()
    }

    fn stop(&mut self) -> TickStats {
        self.running.store(false, Ordering::Release);
        let Some(thread) = self.thread.take() else {
            return TickStats::default();
        };
        thread.join().unwrap_or_else(|_| {
            error!("tick thread panicked");
            TickStats::default()
        })
    }
}

impl Drop for SimServer {
    fn drop(&mut self) {
        self.stop();
    }
}
