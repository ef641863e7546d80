mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use commands::backtest::BacktestArgs;
use commands::model::{FitModelArgs, SimulateArgs};
use commands::selection::SelectPairsArgs;

/// Rolling pairs-trading backtests
#[derive(Parser)]
#[command(
    name = "statarb",
    version,
    about = "Rolling pairs-trading backtests",
    long_about = "Selects cointegrated pairs on rolling formation windows, fits a spread \
                  model per pair and simulates trading it over the following window. \
                  Supports fixed z-score bands and an adaptive Kalman band."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Write log events to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full rolling backtest over a price table
    Backtest(BacktestArgs),
    /// Rank and select pairs on a single formation window
    SelectPairs(SelectPairsArgs),
    /// Fit the state-space spread model to a series with EM
    FitModel(FitModelArgs),
    /// Simulate a state-space series and recover its parameters
    Simulate(SimulateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(log_file: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .map_err(|e| format!("Failed to create log file '{}': {}", path, e))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_file.as_deref()) {
        eprintln!("{}: {}", "error".red().bold(), e);
        process::exit(1);
    }

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Backtest(args) => commands::backtest::run_backtest(args),
        Commands::SelectPairs(args) => commands::selection::run_select_pairs(args),
        Commands::FitModel(args) => commands::model::run_fit_model(args),
        Commands::Simulate(args) => commands::model::run_simulate(args),
        Commands::Version => {
            println!("statarb {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
