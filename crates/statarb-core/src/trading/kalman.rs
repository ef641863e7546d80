use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PairTradeLog, SpreadStrategy, TradeLogBuilder, TradeState};
use crate::config::BacktestConfig;
use crate::model::{StateSpaceModel, StateSpaceParams};
use crate::selection::SelectedPair;
use crate::types::PairId;
use crate::universe::{AlignedLegs, NormalizedSlice};
use crate::StatArbResult;

/// Filtered estimate and variance of one pair's latent spread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KalmanState {
    pub estimate: f64,
    pub variance: f64,
}

impl KalmanState {
    /// Day 0: the estimate is the first observation, the variance `D²`.
    pub fn initial(observed: f64, params: &StateSpaceParams) -> Self {
        Self {
            estimate: observed,
            variance: params.observation_variance(),
        }
    }

    /// Predict, then correct with `observed`.
    pub fn update(&mut self, params: &StateSpaceParams, observed: f64) {
        let x = params.a + params.b * self.estimate;
        let r = params.b * params.b * self.variance + params.transition_variance();
        let denom = r + params.observation_variance();
        let gain = if denom != 0.0 { r / denom } else { 0.0 };
        self.estimate = x + gain * (observed - x);
        self.variance = r - gain * r;
    }

    /// Half-width of the trading band around the estimate.
    pub fn band(&self, threshold_factor: f64) -> f64 {
        self.variance.max(0.0).sqrt() * threshold_factor
    }
}

/// Per-date filter output of one pair's trading window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KalmanTrace {
    pub dates: Vec<NaiveDate>,
    pub observed: Vec<f64>,
    pub filtered_means: Vec<f64>,
    pub filtered_variances: Vec<f64>,
}

impl KalmanTrace {
    fn push(&mut self, date: NaiveDate, observed: f64, state: &KalmanState) {
        self.dates.push(date);
        self.observed.push(observed);
        self.filtered_means.push(state.estimate);
        self.filtered_variances.push(state.variance);
    }
}

/// State-space spread model traded on a band scaled by the filtered variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveKalman {
    pub threshold_factor: f64,
    pub em_iterations: usize,
    pub cost: Option<f64>,
}

impl Default for AdaptiveKalman {
    fn default() -> Self {
        Self {
            threshold_factor: 1.0,
            em_iterations: 20,
            cost: None,
        }
    }
}

impl AdaptiveKalman {
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self {
            threshold_factor: config.threshold_factor,
            em_iterations: config.em_iterations,
            cost: config.effective_cost(),
        }
    }

    /// Filter and trade the observed spread series.
    pub fn simulate_series(
        &self,
        pair: &PairId,
        params: &StateSpaceParams,
        dates: &[NaiveDate],
        observed: &[f64],
    ) -> (PairTradeLog, KalmanTrace) {
        let n = dates.len().min(observed.len());
        let mut book = TradeLogBuilder::new(pair, n, self.cost);
        let mut trace = KalmanTrace::default();
        if n == 0 {
            return (book.finish(), trace);
        }

        let mut filter = KalmanState::initial(observed[0], params);
        trace.push(dates[0], observed[0], &filter);
        book.record(dates[0], 0.0);

        let mut state = TradeState::Flat;
        for i in 1..n {
            let y = observed[i];
            filter.update(params, y);
            trace.push(dates[i], y, &filter);

            let band = filter.band(self.threshold_factor);
            let upper = filter.estimate + band;
            let lower = filter.estimate - band;
            let mut realized = 0.0;

            if state.is_flat() {
                if y > upper {
                    state = TradeState::ShortOpen { entry: y };
                } else if y < lower {
                    state = TradeState::LongOpen { entry: y };
                }
            }
            let exit = match state {
                TradeState::ShortOpen { .. } => y < lower,
                TradeState::LongOpen { .. } => y > upper,
                TradeState::Flat => false,
            };
            if exit {
                realized = state.mark(y);
                debug!(pair = %pair, date = %dates[i], realized, "Position closed");
                state = TradeState::Flat;
                book.closed();
            }

            if i + 1 == n && !state.is_flat() {
                realized = state.mark(y);
                debug!(pair = %pair, date = %dates[i], realized, "Forced close at window end");
                book.forced_close(realized);
                state = TradeState::Flat;
            }

            book.record(dates[i], realized);
        }

        (book.finish(), trace)
    }
}

impl SpreadStrategy for AdaptiveKalman {
    type Model = StateSpaceModel;

    fn name(&self) -> &'static str {
        "kalman"
    }

    fn estimate(
        &self,
        formation: &NormalizedSlice,
        pair: &SelectedPair,
    ) -> StatArbResult<Self::Model> {
        StateSpaceModel::estimate(formation, pair, self.em_iterations)
    }

    fn simulate(&self, pair: &PairId, model: &Self::Model, legs: &AlignedLegs) -> PairTradeLog {
        let observed = legs.spread(model.beta);
        self.simulate_series(pair, &model.params, &legs.dates, &observed).0
    }
}
