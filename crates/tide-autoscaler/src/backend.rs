//! The provisioning seam: whatever actually adds or removes instances.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ScalingError};
use crate::types::TargetId;

/// Future returned by [`ScalingBackend::execute`].
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Applies instance count changes to real infrastructure.
///
/// Only the executor calls this, and never twice concurrently for the same
/// target.
pub trait ScalingBackend: Send + Sync {
    /// Moves `target` from `from` to `to` instances.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::Execution`] if the change could not be applied.
    fn execute<'a>(&'a self, target: &'a TargetId, from: u32, to: u32) -> BackendFuture<'a>;

    /// Returns the name of this backend for logging purposes.
    fn name(&self) -> &'static str {
        "scaling-backend"
    }
}

/// Backend that logs each change and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingBackend;

impl ScalingBackend for LoggingBackend {
    fn execute<'a>(&'a self, target: &'a TargetId, from: u32, to: u32) -> BackendFuture<'a> {
        Box::pin(async move {
            info!(target_id = %target, from, to, "scaling target");
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}

/// One call observed by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCall {
    /// Target scaled.
    pub target_id: TargetId,
    /// Instance count before.
    pub from: u32,
    /// Instance count requested.
    pub to: u32,
}

/// Test backend that records calls and can be told to fail or stall.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<BackendCall>>,
    failing: RwLock<HashSet<TargetId>>,
    delay: RwLock<Option<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RecordingBackend {
    /// Creates a backend that succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call for `target` fail.
    pub fn fail(&self, target: &TargetId) {
        self.failing.write().insert(target.clone());
    }

    /// Stops failing calls for `target`.
    pub fn recover(&self, target: &TargetId) {
        self.failing.write().remove(target);
    }

    /// Makes every call sleep for `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write() = delay;
    }

    /// Calls observed so far, in the order they started.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// The largest number of calls that were running at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScalingBackend for RecordingBackend {
    fn execute<'a>(&'a self, target: &'a TargetId, from: u32, to: u32) -> BackendFuture<'a> {
        Box::pin(async move {
            self.calls.lock().push(BackendCall {
                target_id: target.clone(),
                from,
                to,
            });

            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
            let _guard = InFlightGuard(&self.in_flight);

            let delay = *self.delay.read();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if self.failing.read().contains(target) {
                return Err(ScalingError::Execution {
                    target_id: target.to_string(),
                    reason: "backend rejected the change".into(),
                });
            }
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
