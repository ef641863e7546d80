use std::time::Instant;
use tracing::{info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::output::{BacktestOutput, WindowResult};
use super::window::{Window, WindowSchedule};
use crate::config::{BacktestConfig, StrategyKind};
use crate::selection::{rank_pairs, select_pairs};
use crate::trading::{AdaptiveKalman, FixedThreshold, SpreadStrategy};
use crate::types::{with_metadata, ComputationOutput};
use crate::universe::PriceUniverse;
use crate::StatArbResult;

/// Rolls formation/trading windows across a price universe.
#[derive(Debug, Clone)]
pub struct Backtester<'a> {
    universe: &'a PriceUniverse,
    config: BacktestConfig,
}

impl<'a> Backtester<'a> {
    /// Validates `config` before anything runs.
    pub fn new(universe: &'a PriceUniverse, config: BacktestConfig) -> StatArbResult<Self> {
        config.validate()?;
        Ok(Self { universe, config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn schedule(&self) -> WindowSchedule {
        WindowSchedule::new(
            self.universe,
            self.config.formation_months,
            self.config.trading_months,
        )
    }

    /// Run every window with the configured strategy.
    pub fn run(&self) -> BacktestOutput {
        match self.config.strategy {
            StrategyKind::Fixed => self.run_with(&FixedThreshold::from_config(&self.config)),
            StrategyKind::Kalman => self.run_with(&AdaptiveKalman::from_config(&self.config)),
        }
    }

    /// Run every window with an explicit strategy. Windows are independent;
    /// results keep chronological order.
    pub fn run_with<S: SpreadStrategy>(&self, strategy: &S) -> BacktestOutput {
        let windows: Vec<Window> = self.schedule().collect();
        info!(
            strategy = strategy.name(),
            windows = windows.len(),
            "Starting backtest"
        );

        #[cfg(feature = "parallel")]
        let evaluated: Vec<(Window, StatArbResult<WindowResult>)> = windows
            .par_iter()
            .map(|w| (*w, self.evaluate_window(strategy, w)))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let evaluated: Vec<(Window, StatArbResult<WindowResult>)> = windows
            .iter()
            .map(|w| (*w, self.evaluate_window(strategy, w)))
            .collect();

        let mut output = BacktestOutput {
            strategy: self.config.strategy,
            windows: Vec::with_capacity(evaluated.len()),
            skipped: Vec::new(),
        };
        for (window, result) in evaluated {
            match result {
                Ok(r) => output.windows.push(r),
                Err(e) => {
                    warn!(trading_start = %window.trading_start, error = %e, "Window skipped");
                    output.skipped.push(window);
                }
            }
        }
        output
    }

    /// Select, fit and trade one window.
    pub fn evaluate_window<S: SpreadStrategy>(
        &self,
        strategy: &S,
        window: &Window,
    ) -> StatArbResult<WindowResult> {
        let slice = self.universe.slice(window.formation_start, window.trading_end)?;
        let formation = slice.sub_slice(window.formation_start, window.formation_end)?;
        let trading = slice.sub_slice(window.trading_start, window.trading_end)?;

        let ranked = rank_pairs(&formation);
        let (portfolio, selection) = select_pairs(
            &formation,
            &ranked,
            self.config.target_portfolio_size,
            &self.config.selection,
        );

        let dates = trading.dates().to_vec();
        let mut returns = vec![0.0; dates.len()];
        let mut trade_counts = vec![0usize; dates.len()];
        let mut pairs_traded = 0;
        let mut pairs_skipped = 0;
        let mut diverged = 0;

        for selected in &portfolio.pairs {
            let log = strategy
                .estimate(&formation, selected)
                .and_then(|model| strategy.trade(&selected.pair, &model, &trading));
            let log = match log {
                Ok(log) => log,
                Err(e) => {
                    warn!(pair = %selected.pair, error = %e, "Pair not traded this window");
                    pairs_skipped += 1;
                    continue;
                }
            };
            for ((date, value), flag) in log.dates.iter().zip(&log.realized).zip(&log.trade_flags) {
                if let Ok(row) = dates.binary_search(date) {
                    returns[row] += value;
                    trade_counts[row] += usize::from(*flag);
                }
            }
            pairs_traded += 1;
            diverged += usize::from(log.diverged);
        }

        info!(
            trading_start = %window.trading_start,
            candidates = selection.candidates_ranked,
            portfolio = portfolio.len(),
            pairs_traded,
            diverged,
            "Window complete"
        );

        Ok(WindowResult {
            window: *window,
            portfolio,
            selection,
            dates,
            returns,
            trade_counts,
            pairs_traded,
            pairs_skipped,
            diverged,
        })
    }
}

/// Run the configured backtest and wrap it in the standard output envelope.
pub fn run_backtest(
    universe: &PriceUniverse,
    config: &BacktestConfig,
) -> StatArbResult<ComputationOutput<BacktestOutput>> {
    let start = Instant::now();
    let backtester = Backtester::new(universe, config.clone())?;
    let output = backtester.run();

    let mut warnings = Vec::new();
    if output.windows.is_empty() {
        warnings.push(format!(
            "History from {} to {} is too short for a {}+{} month window",
            universe.first_date(),
            universe.last_date(),
            config.formation_months,
            config.trading_months
        ));
    }
    for w in &output.skipped {
        warnings.push(format!("Window trading from {} was skipped", w.trading_start));
    }
    let short = output
        .windows
        .iter()
        .filter(|w| w.portfolio.len() < config.target_portfolio_size)
        .count();
    if short > 0 {
        warnings.push(format!(
            "{} window(s) found fewer than {} cointegrated pairs",
            short, config.target_portfolio_size
        ));
    }

    let methodology = match config.strategy {
        StrategyKind::Fixed => {
            "Rolling SSD ranking, Engle-Granger selection, fixed z-score band trading"
        }
        StrategyKind::Kalman => concat!(
            "Rolling SSD ranking, Engle-Granger selection, ",
            "EM state-space model with adaptive Kalman band trading"
        ),
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(methodology, config, warnings, elapsed, output))
}
