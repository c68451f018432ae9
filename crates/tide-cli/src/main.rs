//! Tide CLI binary entrypoint.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tide_cli::cli::{Cli, Commands};
use tide_cli::commands::{AnalyzeCommand, SimulateCommand};
use tide_cli::output::OutputFormat;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), tide_cli::CliError> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Simulate(args) => {
            SimulateCommand::new(args).execute(&mut stdout, &format).await?;
        }
        Commands::Analyze(args) => {
            AnalyzeCommand::new(args).execute(&mut stdout, &format)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_analyze_command() {
        let cli = Cli::parse_from(["tide", "analyze", "10,20,30,40,50,60"]);
        assert!(run(cli).await.is_ok());
    }

    #[tokio::test]
    async fn run_with_missing_fleet_fails() {
        let cli = Cli::parse_from(["tide", "simulate", "--fleet", "/nonexistent/fleet.json"]);
        assert!(run(cli).await.is_err());
    }
}
