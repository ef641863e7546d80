use clap::{Args, ValueEnum};
use serde::Serialize;
use serde_json::Value;

use statarb_core::backtest::{self, BacktestSummary};
use statarb_core::{ComputationOutput, StrategyKind};

use crate::input;
use crate::output::csv_out;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    /// Static spread model on fixed z-score bands
    Fixed,
    /// EM state-space model on an adaptive Kalman band
    Kalman,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Fixed => StrategyKind::Fixed,
            StrategyArg::Kalman => StrategyKind::Kalman,
        }
    }
}

/// Arguments for a full rolling backtest
#[derive(Args)]
pub struct BacktestArgs {
    /// Path to the price table CSV (`date,<ticker>...`)
    #[arg(long)]
    pub prices: String,
    /// Path to a JSON or YAML configuration file
    #[arg(long)]
    pub config: Option<String>,
    /// Override the configured strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,
    /// Charge the configured transaction cost on every nonzero daily value
    #[arg(long)]
    pub transaction_costs: bool,
    /// Write the daily return table to this CSV file
    #[arg(long)]
    pub returns_out: Option<String>,
    /// Write the daily trade-count table to this CSV file
    #[arg(long)]
    pub trades_out: Option<String>,
}

#[derive(Serialize)]
struct WindowLine {
    trading_start: String,
    trading_end: String,
    pairs: usize,
    candidates: usize,
    total_return: f64,
    trades: usize,
    diverged: usize,
}

#[derive(Serialize)]
struct BacktestReport {
    #[serde(flatten)]
    summary: BacktestSummary,
    windows_detail: Vec<WindowLine>,
}

pub fn run_backtest(args: BacktestArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let universe = input::prices::read_prices(&args.prices)?;
    let mut config = input::file::read_config(args.config.as_deref())?;
    if let Some(strategy) = args.strategy {
        config.strategy = strategy.into();
    }
    if args.transaction_costs {
        config.use_transaction_costs = true;
    }

    let out = backtest::run_backtest(&universe, &config)?;

    if let Some(path) = &args.returns_out {
        csv_out::write_series_file(path, &out.result.returns_table())?;
    }
    if let Some(path) = &args.trades_out {
        csv_out::write_series_file(path, &out.result.trade_count_table())?;
    }

    let windows_detail = out
        .result
        .windows
        .iter()
        .map(|w| WindowLine {
            trading_start: w.window.trading_start.to_string(),
            trading_end: w.window.trading_end.to_string(),
            pairs: w.portfolio.len(),
            candidates: w.selection.candidates_ranked,
            total_return: w.total_return(),
            trades: w.total_trades(),
            diverged: w.diverged,
        })
        .collect();

    let report = ComputationOutput {
        result: BacktestReport {
            summary: out.result.summary(),
            windows_detail,
        },
        methodology: out.methodology,
        assumptions: out.assumptions,
        warnings: out.warnings,
        metadata: out.metadata,
    };
    Ok(serde_json::to_value(report)?)
}
