//! Wayfarer CLI - Command-line interface
//!
//! Replays recorded fixes or simulates trips against the wayfarer tracking
//! core, printing progress, reroutes and arrival estimates.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use wayfarer::logging::{default_log_dir, default_log_file, init_logging};

use commands::common::GlobalOptions;
use commands::config::ConfigCommands;
use commands::replay::ReplayArgs;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "wayfarer")]
#[command(version = wayfarer::VERSION)]
#[command(about = "Position stabilization and route progress for turn-by-turn navigation", long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded fixes against a route
    Replay(ReplayArgs),

    /// Simulate a trip along a route through the async driver
    Simulate(SimulateArgs),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { options, command } = cli;

    let _logging_guard = init_logging(
        &default_log_dir(),
        default_log_file(),
        options.debug,
        options.debug,
    )
    .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    tracing::info!(version = wayfarer::VERSION, "Wayfarer CLI starting");

    match command {
        Commands::Replay(args) => commands::replay::run(args, &options),
        Commands::Simulate(args) => commands::simulate::run(args, &options),
        Commands::Config { command } => commands::config::run(command, &options),
    }
}
