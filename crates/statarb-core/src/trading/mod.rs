//! Per-pair trading state machines over a trading window.
//!
//! Both rules walk the window once, left to right, starting Flat. Each date
//! gets a realized spread change (zero unless a position closes) and a trade
//! flag; an open position is closed at the last date whatever its sign.

pub mod fixed;
pub mod kalman;

pub use fixed::FixedThreshold;
pub use kalman::{AdaptiveKalman, KalmanState, KalmanTrace};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::selection::SelectedPair;
use crate::types::PairId;
use crate::universe::{AlignedLegs, NormalizedSlice};
use crate::{StatArbError, StatArbResult};

// ---------------------------------------------------------------------------
// Position state
// ---------------------------------------------------------------------------

/// Position in one pair's spread. Reset to `Flat` for every window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum TradeState {
    #[default]
    Flat,
    /// Long the spread, opened at `entry`.
    LongOpen { entry: f64 },
    /// Short the spread, opened at `entry`.
    ShortOpen { entry: f64 },
}

impl TradeState {
    pub fn is_flat(&self) -> bool {
        matches!(self, TradeState::Flat)
    }

    /// +1 long, -1 short, 0 flat.
    pub fn direction(&self) -> f64 {
        match self {
            TradeState::Flat => 0.0,
            TradeState::LongOpen { .. } => 1.0,
            TradeState::ShortOpen { .. } => -1.0,
        }
    }

    pub fn entry(&self) -> Option<f64> {
        match self {
            TradeState::Flat => None,
            TradeState::LongOpen { entry } | TradeState::ShortOpen { entry } => Some(*entry),
        }
    }

    /// Signed change of the position if closed at `spread`.
    pub fn mark(&self, spread: f64) -> f64 {
        match self.entry() {
            Some(entry) => self.direction() * (spread - entry),
            None => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Trade log
// ---------------------------------------------------------------------------

/// Daily outcome of trading one pair over one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairTradeLog {
    pub pair: PairId,
    pub dates: Vec<NaiveDate>,
    /// Realized spread change per date, net of cost when costs apply.
    pub realized: Vec<f64>,
    /// True iff `realized` is nonzero on that date.
    pub trade_flags: Vec<bool>,
    /// Positions closed, forced closes included.
    pub round_trips: usize,
    /// The position force-closed at the last date lost money.
    pub diverged: bool,
}

impl PairTradeLog {
    pub fn total(&self) -> f64 {
        self.realized.iter().sum()
    }

    pub fn trade_count(&self) -> usize {
        self.trade_flags.iter().filter(|f| **f).count()
    }
}

/// Collects per-date results, charging the flat cost on nonzero values.
pub(crate) struct TradeLogBuilder {
    log: PairTradeLog,
    cost: Option<f64>,
}

impl TradeLogBuilder {
    pub(crate) fn new(pair: &PairId, capacity: usize, cost: Option<f64>) -> Self {
        Self {
            log: PairTradeLog {
                pair: pair.clone(),
                dates: Vec::with_capacity(capacity),
                realized: Vec::with_capacity(capacity),
                trade_flags: Vec::with_capacity(capacity),
                round_trips: 0,
                diverged: false,
            },
            cost,
        }
    }

    pub(crate) fn record(&mut self, date: NaiveDate, realized: f64) {
        let value = apply_cost(realized, self.cost);
        self.log.dates.push(date);
        self.log.realized.push(value);
        self.log.trade_flags.push(value != 0.0);
    }

    pub(crate) fn closed(&mut self) {
        self.log.round_trips += 1;
    }

    pub(crate) fn forced_close(&mut self, realized: f64) {
        self.log.round_trips += 1;
        if realized < 0.0 {
            self.log.diverged = true;
        }
    }

    pub(crate) fn finish(self) -> PairTradeLog {
        self.log
    }
}

/// Subtract `cost` from a nonzero realized value; zero stays zero.
pub fn apply_cost(realized: f64, cost: Option<f64>) -> f64 {
    match cost {
        Some(c) if realized != 0.0 => realized - c,
        _ => realized,
    }
}

// ---------------------------------------------------------------------------
// Strategy contract
// ---------------------------------------------------------------------------

/// A spread model estimator paired with the trading rule that consumes it.
pub trait SpreadStrategy: Send + Sync {
    type Model: Send + Sync;

    fn name(&self) -> &'static str;

    /// Fit the pair's model on formation-window data.
    fn estimate(&self, formation: &NormalizedSlice, pair: &SelectedPair)
        -> StatArbResult<Self::Model>;

    /// Trade the pair over the given aligned trading-window legs.
    fn simulate(&self, pair: &PairId, model: &Self::Model, legs: &AlignedLegs) -> PairTradeLog;

    /// Trade the pair over the trading slice, on the dates both legs trade.
    fn trade(
        &self,
        pair: &PairId,
        model: &Self::Model,
        trading: &NormalizedSlice,
    ) -> StatArbResult<PairTradeLog> {
        let legs = trading_legs(trading, pair)?;
        Ok(self.simulate(pair, model, &legs))
    }
}

fn trading_legs(trading: &NormalizedSlice, pair: &PairId) -> StatArbResult<AlignedLegs> {
    let legs = trading.aligned(&pair.leg1, &pair.leg2)?;
    let missing = trading.len() - legs.len();
    if legs.is_empty() {
        return Err(StatArbError::DataGap {
            pair: pair.to_string(),
            missing,
        });
    }
    if missing > 0 {
        trace!(pair = %pair, missing, "Trading on aligned dates only");
    }
    Ok(legs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_sign_follows_direction() {
        assert_eq!(TradeState::LongOpen { entry: 1.0 }.mark(3.0), 2.0);
        assert_eq!(TradeState::ShortOpen { entry: 1.0 }.mark(3.0), -2.0);
        assert_eq!(TradeState::Flat.mark(3.0), 0.0);
    }

    #[test]
    fn test_cost_only_on_nonzero() {
        assert_eq!(apply_cost(0.0, Some(0.006)), 0.0);
        assert_eq!(apply_cost(1.0, Some(0.5)), 0.5);
        assert_eq!(apply_cost(-1.0, Some(0.5)), -1.5);
        assert_eq!(apply_cost(1.0, None), 1.0);
    }

    #[test]
    fn test_builder_flags_follow_net_value() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let mut b = TradeLogBuilder::new(&PairId::new("A", "B"), 2, Some(0.5));
        b.record(date, 0.0);
        b.record(date, 2.0);
        b.forced_close(-1.0);
        let log = b.finish();
        assert_eq!(log.realized, vec![0.0, 1.5]);
        assert_eq!(log.trade_flags, vec![false, true]);
        assert_eq!(log.trade_count(), 1);
        assert!(log.diverged);
    }
}
