//! The probe seam: where utilization readings come from.
//!
//! Production deployments implement [`MetricsSource`] over real telemetry.
//! [`StaticMetricsSource`] and [`ScriptedMetricsSource`] are deterministic
//! implementations for tests and simulations.

use std::collections::{HashMap, HashSet};

use parking_lot::{Mutex, RwLock};

use crate::error::{MetricsError, Result};
use crate::types::{TargetId, Utilization};

/// Produces utilization readings for scaling targets.
pub trait MetricsSource: Send + Sync {
    /// Samples the current utilization of a target.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::CollectionError`] if the probe fails.
    fn sample(&self, target: &TargetId) -> Result<Utilization>;

    /// Returns the name of this source for logging purposes.
    fn name(&self) -> &'static str {
        "metrics-source"
    }
}

/// In-memory source returning the last reading set for each target.
#[derive(Debug, Default)]
pub struct StaticMetricsSource {
    readings: RwLock<HashMap<TargetId, Utilization>>,
    failing: RwLock<HashSet<TargetId>>,
}

impl StaticMetricsSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reading returned for a target.
    pub fn set(&self, target: &TargetId, reading: Utilization) {
        self.readings.write().insert(target.clone(), reading);
    }

    /// Forgets the reading for a target.
    pub fn clear(&self, target: &TargetId) {
        self.readings.write().remove(target);
    }

    /// Makes every sample of `target` fail until [`Self::recover`] is called.
    pub fn fail(&self, target: &TargetId) {
        self.failing.write().insert(target.clone());
    }

    /// Stops failing samples for `target`.
    pub fn recover(&self, target: &TargetId) {
        self.failing.write().remove(target);
    }
}

impl MetricsSource for StaticMetricsSource {
    fn sample(&self, target: &TargetId) -> Result<Utilization> {
        if self.failing.read().contains(target) {
            return Err(MetricsError::CollectionError {
                target: target.to_string(),
                reason: "probe unavailable".into(),
            });
        }
        self.readings
            .read()
            .get(target)
            .copied()
            .ok_or_else(|| MetricsError::CollectionError {
                target: target.to_string(),
                reason: "no reading configured".into(),
            })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

struct Script {
    readings: Vec<Utilization>,
    cursor: usize,
}

/// Replays a fixed sequence of readings per target, wrapping around at the end.
#[derive(Default)]
pub struct ScriptedMetricsSource {
    scripts: Mutex<HashMap<TargetId, Script>>,
}

impl std::fmt::Debug for ScriptedMetricsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedMetricsSource")
            .field("targets", &self.scripts.lock().len())
            .finish()
    }
}

impl ScriptedMetricsSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the reading sequence for a target, restarting from the first.
    pub fn script(&self, target: &TargetId, readings: Vec<Utilization>) {
        self.scripts
            .lock()
            .insert(target.clone(), Script { readings, cursor: 0 });
    }

    /// Installs a CPU-only sequence for a target.
    pub fn script_cpu(&self, target: &TargetId, cpu: &[f64]) {
        let readings = cpu.iter().map(|&v| Utilization::new().with_cpu(v)).collect();
        self.script(target, readings);
    }

    /// Number of readings scripted for a target.
    #[must_use]
    pub fn script_len(&self, target: &TargetId) -> usize {
        self.scripts.lock().get(target).map_or(0, |s| s.readings.len())
    }
}

impl MetricsSource for ScriptedMetricsSource {
    fn sample(&self, target: &TargetId) -> Result<Utilization> {
        let mut scripts = self.scripts.lock();
        let script = scripts
            .get_mut(target)
            .filter(|s| !s.readings.is_empty())
            .ok_or_else(|| MetricsError::CollectionError {
                target: target.to_string(),
                reason: "no script installed".into(),
            })?;

        let reading = script.readings[script.cursor % script.readings.len()];
        script.cursor = (script.cursor + 1) % script.readings.len();
        Ok(reading)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
