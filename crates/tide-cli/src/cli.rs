//! Command-line argument parsing with clap.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

/// Tide - adaptive autoscaling decisions.
#[derive(Parser, Debug, Clone)]
#[command(name = "tide")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(short, long, env = "TIDE_FORMAT", value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a fleet through simulated scheduler ticks and print statistics.
    Simulate(SimulateArgs),

    /// Classify a utilization series.
    Analyze(AnalyzeArgs),
}

/// Arguments for the simulate command.
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Fleet file to load. The built-in demo fleet is used when omitted.
    #[arg(long, env = "TIDE_FLEET")]
    pub fleet: Option<PathBuf>,

    /// Number of scheduler ticks to simulate.
    #[arg(short, long, default_value_t = 120)]
    pub ticks: u32,

    /// Simulated start time (RFC 3339).
    #[arg(long, default_value = "2024-01-01T08:00:00Z")]
    pub start: DateTime<Utc>,

    /// Execute up to this many actions concurrently per cycle.
    #[arg(long)]
    pub concurrent: Option<usize>,
}

/// Arguments for the analyze command.
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    /// CPU utilization values, oldest first.
    #[arg(required = true, num_args = 1.., value_delimiter = ',')]
    pub values: Vec<f64>,

    /// Minutes between consecutive values.
    #[arg(long, default_value_t = 60)]
    pub step_mins: u32,

    /// Timestamp of the first value (RFC 3339).
    #[arg(long, default_value = "2024-01-01T00:00:00Z")]
    pub start: DateTime<Utc>,

    /// Minimum number of values required.
    #[arg(long, default_value_t = 5)]
    pub min_samples: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simulate_defaults() {
        let cli = Cli::parse_from(["tide", "simulate"]);
        match cli.command {
            Commands::Simulate(args) => {
                assert!(args.fleet.is_none());
                assert_eq!(args.ticks, 120);
                assert!(args.concurrent.is_none());
            }
            Commands::Analyze(_) => panic!("expected simulate command"),
        }
    }

    #[test]
    fn parses_analyze_values() {
        let cli = Cli::parse_from(["tide", "analyze", "10,20,30", "40"]);
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.values, vec![10.0, 20.0, 30.0, 40.0]);
                assert_eq!(args.step_mins, 60);
            }
            Commands::Simulate(_) => panic!("expected analyze command"),
        }
    }

    #[test]
    fn respects_format_flag() {
        let cli = Cli::parse_from(["tide", "--format", "json", "simulate"]);
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn log_json_is_global() {
        let cli = Cli::parse_from(["tide", "simulate", "--log-json"]);
        assert!(cli.log_json);
    }

    #[test]
    fn rejects_bad_start() {
        assert!(Cli::try_parse_from(["tide", "simulate", "--start", "yesterday"]).is_err());
    }
}
