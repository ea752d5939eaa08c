//! Command line entry point of the taxi ETL.
//!
//! `extract` lands one day of raw data in the pending area, `load` publishes every pending file
//! and `rollback` restores the previous version of a dimension table. The process exits with a
//! non-zero status when any source or file still failed after retries.

use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use taxi_config::environment::Environment;
use taxi_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_runner_config;
use crate::core::run_command;
use crate::error::{RunnerError, RunnerResult};

mod config;
mod core;
mod error;

#[derive(Debug, Parser)]
#[command(name = "taxi-runner", version, about = "Chicago taxi trips and weather ETL")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Stage to run.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Lands one day of taxi trips and hourly weather in the pending area.
    Extract {
        /// Day to extract, as YYYY-MM-DD. Defaults to today minus the configured lag.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Transforms and publishes every pending raw file.
    Load,
    /// Restores the previous version of a dimension table as the current one.
    ///
    /// Refused when the current version holds keys the previous one lacks, since published
    /// fact outputs may reference them.
    Rollback {
        /// Attribute of the dimension, for example `company`.
        #[arg(long)]
        dimension: String,
        /// Roll back even if keys that fact outputs may reference are withdrawn.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

/// Loads configuration, initializes tracing and runs the command on a fresh runtime.
fn run(cli: Cli) -> RunnerResult<()> {
    let runner_config = load_runner_config()?;

    let environment = Environment::load().map_err(RunnerError::config)?;
    let _log_flusher =
        init_tracing(env!("CARGO_BIN_NAME"), environment).map_err(RunnerError::config)?;

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli.command, runner_config))
}

async fn async_main(command: Command, runner_config: config::RunnerConfig) -> RunnerResult<()> {
    if let Err(err) = run_command(command, runner_config).await {
        error!("{err}");
        return Err(err);
    }

    Ok(())
}
