//! Analyze command implementation.

use std::io::Write;

use tide_autoscaler::{AnalyzerConfig, LoadPattern, PatternAnalyzer, ResourceKind, ScalingTarget};
use tide_metrics::{MetricSample, Utilization};

use crate::cli::AnalyzeArgs;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the analyze command.
pub struct AnalyzeCommand<'a> {
    args: &'a AnalyzeArgs,
}

impl<'a> AnalyzeCommand<'a> {
    /// Creates a new analyze command handler.
    #[must_use]
    pub const fn new(args: &'a AnalyzeArgs) -> Self {
        Self { args }
    }

    /// Classifies the series and prints the pattern.
    ///
    /// # Errors
    ///
    /// Returns error on invalid values or too few of them.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let pattern = self.run()?;
        format.write(out, &pattern)
    }

    /// Classifies the series.
    ///
    /// Values are treated as CPU readings of a compute target, one every
    /// `step_mins` from `start`.
    ///
    /// # Errors
    ///
    /// Returns error on invalid values or too few of them.
    pub fn run(&self) -> Result<LoadPattern, CliError> {
        let args = self.args;
        if args.step_mins == 0 {
            return Err(CliError::InvalidArgument("--step-mins must be at least 1".into()));
        }
        if let Some(bad) = args.values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(CliError::InvalidArgument(format!(
                "utilization values must be non-negative numbers, got {bad}"
            )));
        }

        let config = AnalyzerConfig::default()
            .with_min_samples(args.min_samples)
            .with_window(args.values.len().max(args.min_samples));
        config.validate()?;

        let target = ScalingTarget::builder("series", ResourceKind::Compute).build()?;
        let step = chrono::Duration::minutes(i64::from(args.step_mins));
        let mut at = args.start;
        let samples: Vec<MetricSample> = args
            .values
            .iter()
            .map(|&cpu| {
                let sample = MetricSample::new(target.id.clone(), at, Utilization::new().with_cpu(cpu));
                at += step;
                sample
            })
            .collect();

        let analyzed_at = samples.last().map_or(args.start, |s| s.timestamp);
        let pattern = PatternAnalyzer::new(config).analyze(&target, &samples, analyzed_at)?;
        Ok(pattern)
    }
}
