use chrono::NaiveDate;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::warn;

use statarb_core::model::{StateSpaceModel, StateSpaceParams};
use statarb_core::selection::{rank_pairs, select_pairs, PairCandidate, SelectionReport};
use statarb_core::{with_metadata, StrategyKind};

use crate::input;

/// Arguments for single-window pair selection
#[derive(Args)]
pub struct SelectPairsArgs {
    /// Path to the price table CSV (`date,<ticker>...`)
    #[arg(long)]
    pub prices: String,
    /// First formation date (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,
    /// Last formation date (YYYY-MM-DD)
    #[arg(long)]
    pub end: NaiveDate,
    /// Path to a JSON or YAML configuration file
    #[arg(long)]
    pub config: Option<String>,
    /// How many ranked candidates to list
    #[arg(long, default_value_t = 20)]
    pub top: usize,
}

#[derive(Serialize)]
struct PairLine {
    pair: String,
    distance: f64,
    beta: f64,
    residual_mean: f64,
    residual_sd: f64,
    adf_p_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_space: Option<StateSpaceParams>,
}

#[derive(Serialize)]
struct SelectionOutput {
    formation_start: NaiveDate,
    formation_end: NaiveDate,
    observations: usize,
    #[serde(flatten)]
    report: SelectionReport,
    pairs: Vec<PairLine>,
    candidates: Vec<PairCandidate>,
}

pub fn run_select_pairs(args: SelectPairsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let universe = input::prices::read_prices(&args.prices)?;
    let config = input::file::read_config(args.config.as_deref())?;
    config.validate()?;

    let slice = universe.slice(args.start, args.end)?;
    let ranked = rank_pairs(&slice);
    let (portfolio, report) = select_pairs(
        &slice,
        &ranked,
        config.target_portfolio_size,
        &config.selection,
    );

    let mut warnings = Vec::new();
    let pairs = portfolio
        .pairs
        .iter()
        .map(|p| {
            let state_space = match config.strategy {
                StrategyKind::Fixed => None,
                StrategyKind::Kalman => {
                    match StateSpaceModel::estimate(&slice, p, config.em_iterations) {
                        Ok(model) => Some(model.params),
                        Err(e) => {
                            warn!(pair = %p.pair, error = %e, "State-space fit failed");
                            warnings.push(format!("{}: state-space fit failed: {}", p.pair, e));
                            None
                        }
                    }
                }
            };
            PairLine {
                pair: p.pair.to_string(),
                distance: p.distance,
                beta: p.beta,
                residual_mean: p.residual_mean,
                residual_sd: p.residual_sd,
                adf_p_value: p.adf_p_value,
                state_space,
            }
        })
        .collect();

    if portfolio.len() < config.target_portfolio_size {
        warnings.push(format!(
            "Only {} of {} requested pairs passed the cointegration test",
            portfolio.len(),
            config.target_portfolio_size
        ));
    }

    let result = SelectionOutput {
        formation_start: args.start,
        formation_end: args.end,
        observations: slice.len(),
        report,
        pairs,
        candidates: ranked.into_iter().take(args.top).collect(),
    };
    let elapsed = start.elapsed().as_micros() as u64;
    let out = with_metadata(
        "Normalized-price SSD ranking with Engle-Granger cointegration selection",
        &config,
        warnings,
        elapsed,
        result,
    );
    Ok(serde_json::to_value(out)?)
}
