//! # tide-cli
//!
//! Command-line front end for the Tide autoscaler.
//!
//! Provides commands for:
//! - Simulating a fleet against the engine on a simulated clock
//! - Classifying an ad-hoc utilization series
//!
//! Both print table or JSON output.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod fleet;
pub mod output;

pub use cli::{AnalyzeArgs, Cli, Commands, Format, SimulateArgs};
pub use error::CliError;
pub use fleet::{FleetFile, FleetTarget};
pub use output::OutputFormat;
