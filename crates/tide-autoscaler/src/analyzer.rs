//! Load pattern analysis.
//!
//! Each target's recent samples are reduced to one utilization series, then
//! described by a handful of statistics and classified:
//!
//! | Rule (first match wins)                    | Pattern   | Confidence |
//! |--------------------------------------------|-----------|------------|
//! | coefficient of variation < stable          | stable    | 0.9        |
//! | detrended variation > bursty               | bursty    | 0.8        |
//! | autocorrelation > cyclical                 | cyclical  | 0.7        |
//! | trend > trend threshold                    | growing   | 0.8        |
//! | trend < -trend threshold                   | declining | 0.8        |
//! | otherwise                                  | stable    | 0.6        |
//!
//! Detrended variation is the coefficient of variation of the residuals
//! around a least-squares line, so a steady ramp is not mistaken for noise.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tide_metrics::{MetricSample, Utilization};
use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::error::{AnalysisError, Result};
use crate::types::{LoadPattern, PatternType, ResourceKind, ScalingTarget, TargetId};

/// Means smaller than this are treated as zero.
const ZERO_EPSILON: f64 = 1e-9;

/// Maps a reading to the utilization figure that drives a kind's decisions.
///
/// `connection_capacity` is only used for load balancers.
#[must_use]
pub fn utilization_of(kind: ResourceKind, reading: &Utilization, connection_capacity: f64) -> f64 {
    match kind {
        ResourceKind::Compute => reading.cpu,
        ResourceKind::Container | ResourceKind::Database => reading.cpu.max(reading.memory),
        ResourceKind::Cache => reading.memory,
        ResourceKind::LoadBalancer => {
            if connection_capacity > 0.0 {
                reading.active_connections / connection_capacity * 100.0
            } else {
                0.0
            }
        }
        ResourceKind::QueueWorker => reading.queue_depth,
    }
}

/// Arithmetic mean, 0 for an empty series.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[allow(clippy::cast_precision_loss)]
fn population_stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Population standard deviation divided by the mean.
///
/// A series whose mean is zero has no variation by definition.
#[must_use]
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let mu = mean(values);
    if mu.abs() < ZERO_EPSILON {
        return 0.0;
    }
    population_stddev(values, mu) / mu.abs()
}

/// Coefficient of variation of the residuals around a least-squares line.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn detrended_variation(values: &[f64]) -> f64 {
    let mu = mean(values);
    if values.len() < 2 || mu.abs() < ZERO_EPSILON {
        return 0.0;
    }

    let x_mean = (values.len() - 1) as f64 / 2.0;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - mu);
        sxx += dx * dx;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    let residuals: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(i, y)| y - (mu + slope * (i as f64 - x_mean)))
        .collect();
    population_stddev(&residuals, 0.0) / mu.abs()
}

/// Relative change from the first half of the series to the second.
///
/// Halves split at `len / 2`. Zero when the first half averages zero.
#[must_use]
pub fn trend(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (first, second) = values.split_at(values.len() / 2);
    let first_avg = mean(first);
    if first_avg.abs() < ZERO_EPSILON {
        return 0.0;
    }
    (mean(second) - first_avg) / first_avg
}

/// Normalized autocorrelation at `lag`.
///
/// Zero when the lag is zero, not shorter than the series, or the series has
/// no variance.
#[must_use]
pub fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    if lag == 0 || lag >= values.len() {
        return 0.0;
    }
    let mu = mean(values);
    let denominator: f64 = values.iter().map(|v| (v - mu).powi(2)).sum();
    if denominator < ZERO_EPSILON {
        return 0.0;
    }
    let numerator: f64 = values
        .iter()
        .zip(values.iter().skip(lag))
        .map(|(a, b)| (a - mu) * (b - mu))
        .sum();
    numerator / denominator
}

/// Hours of day (UTC) whose average utilization exceeds `factor` times the
/// overall average.
///
/// `samples` and `series` are parallel: `series[i]` is the utilization of
/// `samples[i]`.
#[must_use]
pub fn peak_hours(samples: &[MetricSample], series: &[f64], factor: f64) -> BTreeSet<u8> {
    let overall = mean(series);
    let mut buckets: BTreeMap<u8, Vec<f64>> = BTreeMap::new();
    for (sample, value) in samples.iter().zip(series) {
        buckets.entry(sample.hour()).or_default().push(*value);
    }

    buckets
        .into_iter()
        .filter(|(_, values)| mean(values) > factor * overall)
        .map(|(hour, _)| hour)
        .collect()
}

/// Descriptive statistics of one utilization series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStats {
    /// Arithmetic mean.
    pub mean: f64,
    /// Maximum value.
    pub peak: f64,
    /// Coefficient of variation.
    pub coefficient_of_variation: f64,
    /// Coefficient of variation after removing the linear trend.
    pub detrended_variation: f64,
    /// Relative change between halves.
    pub trend: f64,
    /// Autocorrelation at a quarter-length lag.
    pub autocorrelation: f64,
    /// Series length.
    pub len: usize,
}

impl SeriesStats {
    /// Computes the statistics of `values`.
    #[must_use]
    pub fn of(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            peak: values.iter().copied().fold(0.0, f64::max),
            coefficient_of_variation: coefficient_of_variation(values),
            detrended_variation: detrended_variation(values),
            trend: trend(values),
            autocorrelation: autocorrelation(values, values.len() / 4),
            len: values.len(),
        }
    }
}

/// Classifies targets and keeps the latest pattern of each.
#[derive(Debug)]
pub struct PatternAnalyzer {
    config: AnalyzerConfig,
    patterns: RwLock<HashMap<TargetId, LoadPattern>>,
}

impl PatternAnalyzer {
    /// Creates an analyzer with the given settings.
    #[must_use]
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            patterns: RwLock::new(HashMap::new()),
        }
    }

    /// The analyzer settings.
    #[must_use]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Classifies a set of statistics. Returns the pattern and its confidence.
    #[must_use]
    pub fn classify(&self, stats: &SeriesStats) -> (PatternType, f64) {
        let c = &self.config;
        if stats.coefficient_of_variation < c.stable_threshold {
            (PatternType::Stable, 0.9)
        } else if stats.detrended_variation > c.bursty_threshold {
            (PatternType::Bursty, 0.8)
        } else if stats.autocorrelation > c.cyclical_threshold {
            (PatternType::Cyclical, 0.7)
        } else if stats.trend > c.trend_threshold {
            (PatternType::Growing, 0.8)
        } else if stats.trend < -c.trend_threshold {
            (PatternType::Declining, 0.8)
        } else {
            (PatternType::Stable, 0.6)
        }
    }

    /// Analyzes a target's samples without storing the result.
    ///
    /// Only the newest `window` samples are considered.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InsufficientSamples`] if fewer than
    /// `min_samples` are available.
    pub fn analyze(
        &self,
        target: &ScalingTarget,
        samples: &[MetricSample],
        now: DateTime<Utc>,
    ) -> Result<LoadPattern> {
        if samples.len() < self.config.min_samples {
            return Err(AnalysisError::InsufficientSamples {
                required: self.config.min_samples,
                available: samples.len(),
            }
            .into());
        }

        let samples = &samples[samples.len().saturating_sub(self.config.window)..];
        let series: Vec<f64> = samples
            .iter()
            .map(|s| utilization_of(target.kind, &s.utilization, target.connection_capacity))
            .collect();

        let stats = SeriesStats::of(&series);
        let (pattern_type, confidence) = self.classify(&stats);

        Ok(LoadPattern {
            target_id: target.id.clone(),
            pattern_type,
            confidence,
            peak_hours: peak_hours(samples, &series, self.config.peak_factor),
            average_load: stats.mean,
            peak_load: stats.peak,
            recommendation: pattern_type.recommendation(),
            last_analyzed: now,
            coefficient_of_variation: stats.coefficient_of_variation,
            trend: stats.trend,
            autocorrelation: stats.autocorrelation,
            sample_count: stats.len,
        })
    }

    /// Analyzes a target and replaces its stored pattern.
    ///
    /// On error the previous pattern, if any, is kept.
    ///
    /// # Errors
    ///
    /// Same as [`Self::analyze`].
    pub fn update(
        &self,
        target: &ScalingTarget,
        samples: &[MetricSample],
        now: DateTime<Utc>,
    ) -> Result<LoadPattern> {
        let pattern = self.analyze(target, samples, now)?;
        debug!(
            target_id = %target.id,
            pattern = %pattern.pattern_type,
            confidence = pattern.confidence,
            samples = pattern.sample_count,
            "load pattern updated"
        );
        self.patterns
            .write()
            .insert(target.id.clone(), pattern.clone());
        Ok(pattern)
    }

    /// The stored pattern for a target.
    #[must_use]
    pub fn pattern(&self, target: &TargetId) -> Option<LoadPattern> {
        self.patterns.read().get(target).cloned()
    }

    /// Every stored pattern, ordered by target ID.
    #[must_use]
    pub fn patterns(&self) -> Vec<LoadPattern> {
        let mut patterns: Vec<LoadPattern> = self.patterns.read().values().cloned().collect();
        patterns.sort_by(|a, b| a.target_id.cmp(&b.target_id));
        patterns
    }
}

impl Default for PatternAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}
