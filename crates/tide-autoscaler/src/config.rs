//! Engine configuration.
//!
//! Every struct has sensible defaults, `const fn` builders and a `validate`
//! method. All of them deserialize with missing fields defaulted, so a fleet
//! file only needs to name what it overrides. Durations are whole seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tide_metrics::RetentionPolicy;

use crate::error::{Result, ScalingError};

/// Pattern analyzer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Samples required before a target is classified.
    pub min_samples: usize,
    /// Most recent samples considered per analysis.
    pub window: usize,
    /// Coefficient of variation below which load is stable.
    pub stable_threshold: f64,
    /// Coefficient of variation above which load is bursty.
    pub bursty_threshold: f64,
    /// Autocorrelation above which load is cyclical.
    pub cyclical_threshold: f64,
    /// Absolute trend beyond which load is growing or declining.
    pub trend_threshold: f64,
    /// Multiple of the overall average an hour must exceed to be a peak.
    pub peak_factor: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_samples: 5,
            window: 288,
            stable_threshold: 0.1,
            bursty_threshold: 0.3,
            cyclical_threshold: 0.5,
            trend_threshold: 0.1,
            peak_factor: 1.2,
        }
    }
}

impl AnalyzerConfig {
    /// Sets the minimum sample count.
    #[must_use]
    pub const fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Sets the analysis window.
    #[must_use]
    pub const fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Sets the peak-hour factor.
    #[must_use]
    pub const fn with_peak_factor(mut self, peak_factor: f64) -> Self {
        self.peak_factor = peak_factor;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::Configuration`] on inconsistent settings.
    pub fn validate(&self) -> Result<()> {
        if self.min_samples < 2 {
            return Err(ScalingError::config("analyzer min_samples must be at least 2"));
        }
        if self.window < self.min_samples {
            return Err(ScalingError::config(format!(
                "analyzer window ({}) cannot be smaller than min_samples ({})",
                self.window, self.min_samples
            )));
        }
        for (name, value) in [
            ("stable_threshold", self.stable_threshold),
            ("bursty_threshold", self.bursty_threshold),
            ("cyclical_threshold", self.cyclical_threshold),
            ("trend_threshold", self.trend_threshold),
            ("peak_factor", self.peak_factor),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ScalingError::config(format!(
                    "analyzer {name} must be positive, got {value}"
                )));
            }
        }
        if self.stable_threshold >= self.bursty_threshold {
            return Err(ScalingError::config(
                "analyzer stable_threshold must be less than bursty_threshold",
            ));
        }
        Ok(())
    }
}

/// Decision engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Multiple of the scale-up threshold above which scale-up is critical.
    pub critical_factor: f64,
    /// Fraction of the scale-up threshold a forecast must exceed to pre-scale.
    pub predictive_factor: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            critical_factor: 1.2,
            predictive_factor: 0.8,
        }
    }
}

impl DecisionConfig {
    /// Sets the critical factor.
    #[must_use]
    pub const fn with_critical_factor(mut self, factor: f64) -> Self {
        self.critical_factor = factor;
        self
    }

    /// Sets the predictive factor.
    #[must_use]
    pub const fn with_predictive_factor(mut self, factor: f64) -> Self {
        self.predictive_factor = factor;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::Configuration`] if a factor is not positive.
    pub fn validate(&self) -> Result<()> {
        if !self.critical_factor.is_finite() || self.critical_factor < 1.0 {
            return Err(ScalingError::config("decision critical_factor must be at least 1.0"));
        }
        if !self.predictive_factor.is_finite() || self.predictive_factor <= 0.0 {
            return Err(ScalingError::config("decision predictive_factor must be positive"));
        }
        Ok(())
    }
}

/// How the executor runs a batch of pending actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One action at a time, in priority order.
    #[default]
    Sequential,
    /// Up to `max_in_flight` actions at once, never two on the same target.
    Concurrent {
        /// Upper bound on simultaneous backend calls.
        max_in_flight: usize,
    },
}

/// Action executor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Sequential or bounded-concurrent execution.
    pub mode: ExecutionMode,
    /// Upper bound on any single backend call.
    #[serde(with = "tide_metrics::duration_secs")]
    pub hard_timeout: Duration,
    /// How long terminal actions stay in the registry.
    #[serde(with = "tide_metrics::duration_secs")]
    pub finished_retention: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            hard_timeout: Duration::from_secs(10 * 60),
            finished_retention: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl ExecutorConfig {
    /// Sets the execution mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the hard timeout.
    #[must_use]
    pub const fn with_hard_timeout(mut self, timeout: Duration) -> Self {
        self.hard_timeout = timeout;
        self
    }

    /// Sets the terminal action retention.
    #[must_use]
    pub const fn with_finished_retention(mut self, retention: Duration) -> Self {
        self.finished_retention = retention;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::Configuration`] on a zero timeout or a
    /// concurrent mode without slots.
    pub fn validate(&self) -> Result<()> {
        if self.hard_timeout.is_zero() {
            return Err(ScalingError::config("executor hard_timeout must be non-zero"));
        }
        if let ExecutionMode::Concurrent { max_in_flight: 0 } = self.mode {
            return Err(ScalingError::config(
                "executor max_in_flight must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Loop cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Collection interval.
    #[serde(with = "tide_metrics::duration_secs")]
    pub collect_every: Duration,
    /// Analysis interval.
    #[serde(with = "tide_metrics::duration_secs")]
    pub analyze_every: Duration,
    /// Decision interval.
    #[serde(with = "tide_metrics::duration_secs")]
    pub decide_every: Duration,
    /// Execution interval.
    #[serde(with = "tide_metrics::duration_secs")]
    pub execute_every: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            collect_every: Duration::from_secs(30),
            analyze_every: Duration::from_secs(5 * 60),
            decide_every: Duration::from_secs(2 * 60),
            execute_every: Duration::from_secs(30),
        }
    }
}

impl SchedulerConfig {
    /// Sets the collection interval.
    #[must_use]
    pub const fn with_collect_every(mut self, every: Duration) -> Self {
        self.collect_every = every;
        self
    }

    /// Sets the analysis interval.
    #[must_use]
    pub const fn with_analyze_every(mut self, every: Duration) -> Self {
        self.analyze_every = every;
        self
    }

    /// Sets the decision interval.
    #[must_use]
    pub const fn with_decide_every(mut self, every: Duration) -> Self {
        self.decide_every = every;
        self
    }

    /// Sets the execution interval.
    #[must_use]
    pub const fn with_execute_every(mut self, every: Duration) -> Self {
        self.execute_every = every;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScalingError::Configuration`] if any interval is zero.
    pub fn validate(&self) -> Result<()> {
        for (name, every) in [
            ("collect_every", self.collect_every),
            ("analyze_every", self.analyze_every),
            ("decide_every", self.decide_every),
            ("execute_every", self.execute_every),
        ] {
            if every.is_zero() {
                return Err(ScalingError::config(format!(
                    "scheduler {name} must be non-zero"
                )));
            }
        }
        Ok(())
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoScalerConfig {
    /// Sample history retention.
    pub retention: RetentionPolicy,
    /// Pattern analyzer settings.
    pub analyzer: AnalyzerConfig,
    /// Decision engine settings.
    pub decision: DecisionConfig,
    /// Executor settings.
    pub executor: ExecutorConfig,
    /// Loop cadences.
    pub scheduler: SchedulerConfig,
}

impl AutoScalerConfig {
    /// Sets the retention policy.
    #[must_use]
    pub const fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Sets the analyzer settings.
    #[must_use]
    pub const fn with_analyzer(mut self, analyzer: AnalyzerConfig) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Sets the decision settings.
    #[must_use]
    pub const fn with_decision(mut self, decision: DecisionConfig) -> Self {
        self.decision = decision;
        self
    }

    /// Sets the executor settings.
    #[must_use]
    pub const fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Sets the loop cadences.
    #[must_use]
    pub const fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first section's validation error.
    pub fn validate(&self) -> Result<()> {
        self.retention.validate()?;
        self.analyzer.validate()?;
        self.decision.validate()?;
        self.executor.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}
