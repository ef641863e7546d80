use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PairTradeLog, SpreadStrategy, TradeLogBuilder, TradeState};
use crate::config::BacktestConfig;
use crate::model::StaticSpreadModel;
use crate::selection::SelectedPair;
use crate::types::PairId;
use crate::universe::{AlignedLegs, NormalizedSlice};
use crate::StatArbResult;

/// Static spread model traded on fixed z-score bands.
///
/// Opens short above `+entry_z`, long below `-entry_z`; a short closes once
/// the z-score falls to `exit_z`, a long once it rises to `-exit_z`. A normal
/// exit realizes the absolute spread change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedThreshold {
    pub entry_z: f64,
    pub exit_z: f64,
    pub cost: Option<f64>,
}

impl Default for FixedThreshold {
    fn default() -> Self {
        Self {
            entry_z: 2.0,
            exit_z: 0.0,
            cost: None,
        }
    }
}

impl FixedThreshold {
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self {
            entry_z: config.entry_z,
            exit_z: config.exit_z,
            cost: config.effective_cost(),
        }
    }

    /// Run the band rule over parallel `raw` and `z` series.
    pub fn simulate_series(
        &self,
        pair: &PairId,
        dates: &[NaiveDate],
        raw: &[f64],
        z: &[f64],
    ) -> PairTradeLog {
        let n = dates.len().min(raw.len()).min(z.len());
        let mut book = TradeLogBuilder::new(pair, n, self.cost);
        let mut state = TradeState::Flat;

        for i in 0..n {
            let (spread, score) = (raw[i], z[i]);
            let mut realized = 0.0;

            // Entry is checked first, then exit against the updated state.
            if state.is_flat() && score.abs() > self.entry_z {
                state = if score > self.entry_z {
                    TradeState::ShortOpen { entry: spread }
                } else {
                    TradeState::LongOpen { entry: spread }
                };
            }
            let exit = match state {
                TradeState::ShortOpen { .. } => score <= self.exit_z,
                TradeState::LongOpen { .. } => score >= -self.exit_z,
                TradeState::Flat => false,
            };
            if exit {
                if let Some(entry) = state.entry() {
                    realized = (spread - entry).abs();
                }
                debug!(pair = %pair, date = %dates[i], realized, "Position closed");
                state = TradeState::Flat;
                book.closed();
            }

            if i + 1 == n && !state.is_flat() {
                realized = state.mark(spread);
                debug!(pair = %pair, date = %dates[i], realized, "Forced close at window end");
                book.forced_close(realized);
                state = TradeState::Flat;
            }

            book.record(dates[i], realized);
        }

        book.finish()
    }
}

impl SpreadStrategy for FixedThreshold {
    type Model = StaticSpreadModel;

    fn name(&self) -> &'static str {
        "fixed"
    }

    fn estimate(
        &self,
        _formation: &NormalizedSlice,
        pair: &SelectedPair,
    ) -> StatArbResult<Self::Model> {
        StaticSpreadModel::from_selected(pair)
    }

    fn simulate(&self, pair: &PairId, model: &Self::Model, legs: &AlignedLegs) -> PairTradeLog {
        let raw = legs.spread(model.beta);
        let z: Vec<f64> = raw.iter().map(|s| model.z_score(*s)).collect();
        self.simulate_series(pair, &legs.dates, &raw, &z)
    }
}
