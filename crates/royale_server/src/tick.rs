//! Server tick loop.
//!
//! Each tick:
//!
//! 1. Apply every command queued since the last tick (joins, reports,
//!    leaves).
//! 2. Run the broadcast pass.
//! 3. Disconnect clients whose transport refused a frame.
//! 4. Advance the tick counter.
//!
//! A panic inside a tick is logged and the loop moves on to the next one.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::broadcast::{BroadcastReport, Broadcaster};
use crate::session::{ServerSession, SessionCommand};

/// Configuration for the server tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

/// Receiving half of the session command queue.
pub type CommandReceiver = mpsc::UnboundedReceiver<SessionCommand>;

/// Sending half of the session command queue.
pub type CommandSender = mpsc::UnboundedSender<SessionCommand>;

/// The server's tick loop state.
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    session: ServerSession,
    broadcaster: Broadcaster,
    commands: CommandReceiver,
}

impl TickLoop {
    /// Create a new tick loop.
    #[must_use]
    pub fn new(
        config: TickConfig,
        session: ServerSession,
        broadcaster: Broadcaster,
        commands: CommandReceiver,
    ) -> Self {
        Self {
            tick_id: 0,
            config,
            session,
            broadcaster,
            commands,
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Returns the session.
    #[must_use]
    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    /// Run one tick.
    pub fn tick(&mut self) -> BroadcastReport {
        self.tick_id += 1;

        let applied = self.drain_commands();
        let report = self
            .broadcaster
            .run(self.session.store(), self.session.clients());
        for client_id in &report.failed {
            self.session.disconnect(*client_id);
        }

        debug!(
            tick_id = self.tick_id,
            applied,
            clients = self.session.clients().len(),
            entities = self.session.store().entity_count(),
            sent = report.sent,
            "tick complete"
        );
        report
    }

    fn drain_commands(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.commands.try_recv() {
            applied += 1;
            if let Err(e) = self.session.apply(command) {
                warn!(tick_id = self.tick_id, error = %e, "rejected session command");
            }
        }
        applied
    }

    /// Run the tick loop for the configured number of ticks, or until the
    /// surrounding task is cancelled.
    pub async fn run(&mut self) {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let mut interval = tokio::time::interval(tick_duration);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            interval.tick().await;
            let start = Instant::now();

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.tick())) {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(tick_id = self.tick_id, %reason, "tick panicked; continuing");
            }

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed > tick_duration {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}
