//! Fixed-cadence loops driving the engine.
//!
//! Each loop owns a [`Ticker`] and stops when the shared shutdown flag flips
//! to `true`.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

/// An interval that can be interrupted by a shutdown signal.
///
/// Missed ticks are skipped rather than bursted.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
    shutdown: watch::Receiver<bool>,
}

impl Ticker {
    /// Creates a ticker firing every `period`. The first tick is immediate.
    ///
    /// `period` must be non-zero.
    #[must_use]
    pub fn new(period: Duration, shutdown: watch::Receiver<bool>) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, shutdown }
    }

    /// Waits for the next tick. Returns `false` once shutdown is signalled
    /// or the signal sender is gone.
    pub async fn tick(&mut self) -> bool {
        loop {
            if *self.shutdown.borrow() {
                return false;
            }
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
                _ = self.interval.tick() => return true,
            }
        }
    }
}

/// Handles of the running loops and the signal that stops them.
#[derive(Debug)]
pub(crate) struct LoopSet {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl LoopSet {
    pub(crate) fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Spawns a loop running `cycle` once per tick.
    pub(crate) fn spawn<F, Fut>(&mut self, name: &'static str, period: Duration, mut cycle: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut ticker = Ticker::new(period, self.shutdown.subscribe());
        let handle = tokio::spawn(async move {
            info!(loop_name = name, period_secs = period.as_secs(), "scaling loop started");
            while ticker.tick().await {
                cycle().await;
            }
            info!(loop_name = name, "scaling loop stopped");
        });
        self.tasks.push((name, handle));
    }

    /// Signals every loop to stop and waits for them.
    pub(crate) async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (name, handle) in self.tasks {
            if let Err(e) = handle.await {
                warn!(loop_name = name, error = %e, "scaling loop ended abnormally");
            }
        }
    }
}
