//! Periodic sampling of every registered target into bounded histories.
//!
//! The collector is the only writer of sample history. A probe failure for
//! one target is logged and skipped; the rest of the cycle continues.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::history::{RetentionPolicy, SampleHistory};
use crate::source::MetricsSource;
use crate::types::{MetricSample, TargetId};

/// Outcome of one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionReport {
    /// Targets sampled successfully.
    pub collected: usize,
    /// Targets whose probe failed, with the error text.
    pub failed: Vec<(TargetId, String)>,
}

impl CollectionReport {
    /// Whether every target was sampled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Samples targets through a [`MetricsSource`] and keeps their history.
pub struct MetricsCollector {
    source: Arc<dyn MetricsSource>,
    policy: RetentionPolicy,
    histories: RwLock<HashMap<TargetId, SampleHistory>>,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("source", &self.source.name())
            .field("policy", &self.policy)
            .field("targets", &self.histories.read().len())
            .finish()
    }
}

impl MetricsCollector {
    /// Creates a collector over the given source.
    #[must_use]
    pub fn new(source: Arc<dyn MetricsSource>, policy: RetentionPolicy) -> Self {
        Self {
            source,
            policy,
            histories: RwLock::new(HashMap::new()),
        }
    }

    /// The retention policy applied to every history.
    #[must_use]
    pub const fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Samples one target and appends the result to its history.
    ///
    /// # Errors
    ///
    /// Returns the probe error, or [`crate::MetricsError::InvalidSample`] if
    /// the reading has a negative or non-finite dimension. History is left
    /// untouched on error.
    pub fn sample(&self, target: &TargetId, now: DateTime<Utc>) -> Result<MetricSample> {
        let utilization = self.source.sample(target)?;
        utilization.validate()?;

        let sample = MetricSample::new(target.clone(), now, utilization);
        self.record(sample.clone(), now);
        Ok(sample)
    }

    /// Appends an already-taken sample to its target's history.
    pub fn record(&self, sample: MetricSample, now: DateTime<Utc>) {
        let mut histories = self.histories.write();
        histories
            .entry(sample.target_id.clone())
            .or_insert_with(|| SampleHistory::new(self.policy))
            .push(sample, now);
    }

    /// Runs one collection cycle over `targets`.
    pub fn collect_once(&self, targets: &[TargetId], now: DateTime<Utc>) -> CollectionReport {
        let mut report = CollectionReport::default();

        for target in targets {
            match self.sample(target, now) {
                Ok(_) => report.collected += 1,
                Err(e) => {
                    warn!(
                        target_id = %target,
                        source = self.source.name(),
                        error = %e,
                        "metric collection failed, skipping target"
                    );
                    report.failed.push((target.clone(), e.to_string()));
                }
            }
        }

        debug!(
            collected = report.collected,
            failed = report.failed.len(),
            "collection cycle finished"
        );
        report
    }

    /// Applies age-based eviction to every history. Returns samples dropped.
    pub fn expire(&self, now: DateTime<Utc>) -> usize {
        let mut histories = self.histories.write();
        histories.values_mut().map(|h| h.expire(now)).sum()
    }

    /// The most recent sample for a target.
    #[must_use]
    pub fn latest(&self, target: &TargetId) -> Option<MetricSample> {
        self.histories.read().get(target)?.latest().cloned()
    }

    /// Up to `n` most recent samples for a target, oldest first.
    #[must_use]
    pub fn window(&self, target: &TargetId, n: usize) -> Vec<MetricSample> {
        self.histories
            .read()
            .get(target)
            .map(|h| h.window(n))
            .unwrap_or_default()
    }

    /// Every retained sample for a target, oldest first.
    #[must_use]
    pub fn history(&self, target: &TargetId) -> Vec<MetricSample> {
        self.histories
            .read()
            .get(target)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The `n` newest samples across all targets, newest first.
    ///
    /// Ties on timestamp are ordered by target ID.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<MetricSample> {
        let histories = self.histories.read();
        let mut all: Vec<MetricSample> = histories
            .values()
            .flat_map(|h| h.window(n))
            .collect();
        all.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        all.truncate(n);
        all
    }

    /// Number of samples retained for a target.
    #[must_use]
    pub fn sample_count(&self, target: &TargetId) -> usize {
        self.histories.read().get(target).map_or(0, SampleHistory::len)
    }

    /// The latest sample of every target that has one, ordered by target ID.
    #[must_use]
    pub fn latest_all(&self) -> Vec<MetricSample> {
        let histories = self.histories.read();
        let mut latest: Vec<MetricSample> = histories
            .values()
            .filter_map(|h| h.latest().cloned())
            .collect();
        latest.sort_by(|a, b| a.target_id.cmp(&b.target_id));
        latest
    }
}
