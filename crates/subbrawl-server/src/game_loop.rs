//! Fixed-rate tick thread.
//!
//! The only writer of the world. Runs on its own OS thread and never
//! awaits: commands arrive through the bounded queue, results leave through
//! oneshot replies, the latest-snapshot watch and the broadcaster.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use subbrawl_core::state::WorldSnapshot;
use subbrawl_sim::SimulationEngine;

use crate::broadcast::Broadcaster;
use crate::queue::CommandReceiver;

/// Counters kept by the tick thread and returned on shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    pub ticks: u64,
    pub overruns: u64,
    pub commands_applied: u64,
    pub commands_rejected: u64,
    pub faults: u64,
}

/// Start the tick thread. It runs until `running` is cleared.
pub fn spawn(
    engine: SimulationEngine,
    commands: CommandReceiver,
    snapshots: watch::Sender<Arc<WorldSnapshot>>,
    broadcaster: Broadcaster,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<TickStats>> {
    thread::Builder::new()
        .name("subbrawl-tick".into())
        .spawn(move || run_loop(engine, commands, snapshots, broadcaster, running))
}

fn run_loop(
    mut engine: SimulationEngine,
    mut commands: CommandReceiver,
    snapshots: watch::Sender<Arc<WorldSnapshot>>,
    broadcaster: Broadcaster,
    running: Arc<AtomicBool>,
) -> TickStats {
    let period = Duration::from_secs_f64(engine.config().dt());
    let max_commands = engine.config().max_commands_per_tick;
    let snapshot_interval = engine.config().stream.snapshot_interval_ticks;
    let mut stats = TickStats::default();
    let mut next = Instant::now() + period;

    info!(tick_hz = engine.config().tick_hz, "tick loop started");

    while running.load(Ordering::Acquire) {
        let start = Instant::now();

        // 1. Remove what was destroyed or terminated last tick
        let removed = engine.begin_tick().len();
        if removed > 0 {
            debug!(removed, "entities removed");
        }

        // 2. Apply queued commands, bounded by count and half a period
        for pending in commands.drain(max_commands, start + period / 2) {
            let result = engine.apply(pending.issuer, pending.command);
            // The caller may have stopped waiting.
            let _ = pending.reply.send(result);
        }

        // 3. Advance the world
        let report = engine.step();
        stats.ticks += 1;
        stats.commands_applied += report.commands_applied as u64;
        stats.commands_rejected += report.commands_rejected as u64;
        stats.faults += report.faults.len() as u64;

        // 4. Publish
        snapshots.send_replace(Arc::new(report.snapshot.clone()));
        broadcaster.publish(&report, snapshot_interval);

        // 5. Sleep until the next period
        let now = Instant::now();
        if now < next {
            thread::sleep(next - now);
            next += period;
        } else {
            stats.overruns += 1;
            warn!(
                tick = report.snapshot.time.tick,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "tick overran its period"
            );
            // Far behind: restart the schedule rather than burst to catch up.
            next = if now - next > period * 2 {
                now + period
            } else {
                next + period
            };
        }
    }

    broadcaster.close();
    info!(
        ticks = stats.ticks,
        overruns = stats.overruns,
        commands_applied = stats.commands_applied,
        commands_rejected = stats.commands_rejected,
        "tick loop stopped"
    );
    stats
}
