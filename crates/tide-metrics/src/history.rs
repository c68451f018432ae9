//! Bounded per-target sample history.
//!
//! Samples are kept in timestamp order and evicted from the front when the
//! history exceeds either bound of its [`RetentionPolicy`].

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};
use crate::types::MetricSample;

/// How many samples a history keeps, and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Maximum number of samples per target.
    pub max_samples: usize,
    /// Samples older than this are evicted.
    #[serde(with = "crate::duration_secs")]
    pub max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_samples: 720,                       // 6h at 30s cadence
            max_age: Duration::from_secs(6 * 3600), // 6 hours
        }
    }
}

impl RetentionPolicy {
    /// Creates a policy with the given bounds.
    #[must_use]
    pub const fn new(max_samples: usize, max_age: Duration) -> Self {
        Self {
            max_samples,
            max_age,
        }
    }

    /// Sets the sample count bound.
    #[must_use]
    pub const fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Sets the age bound.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Validates this policy.
    ///
    /// # Errors
    ///
    /// Returns error if either bound is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_samples == 0 {
            return Err(MetricsError::InvalidRetention {
                reason: "max_samples must be at least 1".into(),
            });
        }
        if self.max_age.is_zero() {
            return Err(MetricsError::InvalidRetention {
                reason: "max_age must be greater than zero".into(),
            });
        }
        Ok(())
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let max_age = chrono::Duration::from_std(self.max_age)
            .unwrap_or_else(|_| chrono::Duration::hours(6));
        now - max_age
    }
}

/// Time-ordered, bounded history of samples for a single target.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleHistory {
    samples: VecDeque<MetricSample>,
    policy: RetentionPolicy,
}

impl SampleHistory {
    /// Creates an empty history with the given retention.
    #[must_use]
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            samples: VecDeque::with_capacity(policy.max_samples.min(1024)),
            policy,
        }
    }

    /// Appends a sample, then evicts by age relative to `now` and by count.
    pub fn push(&mut self, sample: MetricSample, now: DateTime<Utc>) {
        // Keep timestamp order even if a probe reports late
        let pos = self
            .samples
            .partition_point(|existing| existing.timestamp <= sample.timestamp);
        self.samples.insert(pos, sample);

        self.evict_older_than(self.policy.cutoff(now));
        while self.samples.len() > self.policy.max_samples {
            self.samples.pop_front();
        }
    }

    /// Drops every sample taken before `cutoff`. Returns how many were dropped.
    pub fn evict_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.samples.len();
        while self
            .samples
            .front()
            .is_some_and(|oldest| oldest.timestamp < cutoff)
        {
            self.samples.pop_front();
        }
        before - self.samples.len()
    }

    /// Applies the age bound of the retention policy relative to `now`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        self.evict_older_than(self.policy.cutoff(now))
    }

    /// Returns the most recent sample.
    #[must_use]
    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }

    /// Returns up to `n` of the most recent samples, oldest first.
    #[must_use]
    pub fn window(&self, n: usize) -> Vec<MetricSample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).cloned().collect()
    }

    /// Iterates over all retained samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &MetricSample> {
        self.samples.iter()
    }

    /// Number of retained samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the history holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The retention policy in force.
    #[must_use]
    pub const fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }
}
