//! Simulate command implementation.
//!
//! Replays a fleet's scripted load through every engine stage on a simulated
//! clock. Each tick advances the clock by the greatest common divisor of the
//! loop cadences and runs the stages that are due, in pipeline order.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tide_autoscaler::{
    AutoScaler, ExecutionMode, LoggingBackend, ManualClock, ScalingStatistics, SchedulerConfig,
};
use tide_metrics::ScriptedMetricsSource;
use tracing::{debug, info};

use crate::cli::SimulateArgs;
use crate::error::CliError;
use crate::fleet::FleetFile;
use crate::output::OutputFormat;

/// Handler for the simulate command.
pub struct SimulateCommand<'a> {
    args: &'a SimulateArgs,
}

impl<'a> SimulateCommand<'a> {
    /// Creates a new simulate command handler.
    #[must_use]
    pub const fn new(args: &'a SimulateArgs) -> Self {
        Self { args }
    }

    /// Runs the simulation and prints the final statistics.
    ///
    /// # Errors
    ///
    /// Returns error if the fleet cannot be loaded or the engine rejects it.
    pub async fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let stats = self.run().await?;
        format.write(out, &stats)
    }

    /// Runs the simulation and returns the final statistics.
    ///
    /// # Errors
    ///
    /// Returns error if the fleet cannot be loaded or the engine rejects it.
    pub async fn run(&self) -> Result<ScalingStatistics, CliError> {
        let fleet = match &self.args.fleet {
            Some(path) => FleetFile::load(path)?,
            None => FleetFile::demo()?,
        };

        let mut config = fleet.config;
        if let Some(max_in_flight) = self.args.concurrent {
            if max_in_flight == 0 {
                return Err(CliError::InvalidArgument(
                    "--concurrent must be at least 1".into(),
                ));
            }
            config = config.with_executor(
                config
                    .executor
                    .with_mode(ExecutionMode::Concurrent { max_in_flight }),
            );
        }

        let source = Arc::new(ScriptedMetricsSource::new());
        let clock = Arc::new(ManualClock::new(self.args.start));
        let scaler = AutoScaler::builder(source.clone(), Arc::new(LoggingBackend))
            .config(config)
            .clock(clock.clone())
            .build()?;

        for entry in fleet.targets {
            source.script(&entry.target.id, entry.load);
            scaler.register_target(entry.target)?;
        }

        let cadence = Cadence::new(&scaler.config().scheduler);
        let step = chrono::Duration::from_std(Duration::from_secs(cadence.step))
            .map_err(|e| CliError::InvalidArgument(format!("cadence out of range: {e}")))?;

        info!(
            targets = scaler.targets().len(),
            ticks = self.args.ticks,
            step_secs = cadence.step,
            "simulating fleet"
        );

        for tick in 0..self.args.ticks {
            let elapsed = u64::from(tick) * cadence.step;

            if Cadence::due(elapsed, cadence.collect) {
                scaler.run_collection_cycle();
            }
            if Cadence::due(elapsed, cadence.analyze) {
                scaler.run_analysis_cycle();
            }
            if Cadence::due(elapsed, cadence.decide) {
                scaler.run_decision_cycle();
            }
            if Cadence::due(elapsed, cadence.execute) {
                let report = scaler.run_execution_cycle().await;
                debug!(tick, completed = report.completed, failed = report.failed, "tick executed");
            }

            clock.advance(step);
        }

        Ok(scaler.get_scaling_statistics())
    }
}

/// Loop cadences in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cadence {
    step: u64,
    collect: u64,
    analyze: u64,
    decide: u64,
    execute: u64,
}

impl Cadence {
    fn new(scheduler: &SchedulerConfig) -> Self {
        let secs = |d: Duration| d.as_secs().max(1);
        let collect = secs(scheduler.collect_every);
        let analyze = secs(scheduler.analyze_every);
        let decide = secs(scheduler.decide_every);
        let execute = secs(scheduler.execute_every);
        Self {
            step: gcd(gcd(collect, analyze), gcd(decide, execute)),
            collect,
            analyze,
            decide,
            execute,
        }
    }

    const fn due(elapsed: u64, every: u64) -> bool {
        elapsed % every == 0
    }
}

const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}
