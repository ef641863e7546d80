use serde::{Deserialize, Serialize};

use crate::{StatArbError, StatArbResult};

/// Which spread model and trading rule a backtest runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Static mean/sd model traded on fixed z-score bands.
    #[default]
    Fixed,
    /// EM-fitted state-space model traded on a filtered-variance band.
    Kalman,
}

/// What a candidate whose regression or stationarity test fails numerically
/// does to the portfolio budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedFitPolicy {
    /// Move on to the next candidate; the budget is untouched.
    #[default]
    Skip,
    /// The failed candidate uses up one portfolio slot without adding a pair.
    ConsumeSlot,
}

/// Cointegration gate settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// A pair is accepted when the ADF p-value is strictly below this.
    #[serde(default = "default_adf_significance")]
    pub adf_significance: f64,
    /// Hedge-slope p-value ceiling checked before the ADF test.
    /// `None` skips the slope gate entirely.
    #[serde(default = "default_slope_significance")]
    pub slope_significance: Option<f64>,
    #[serde(default)]
    pub failed_fit_policy: FailedFitPolicy,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            adf_significance: default_adf_significance(),
            slope_significance: default_slope_significance(),
            failed_fit_policy: FailedFitPolicy::default(),
        }
    }
}

/// Full backtest configuration. Every field has a default so an empty JSON
/// object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub use_transaction_costs: bool,
    /// Flat cost subtracted from every nonzero realized value.
    #[serde(default = "default_transaction_cost")]
    pub transaction_cost: f64,
    /// Width multiplier of the adaptive band (kalman strategy only).
    #[serde(default = "default_threshold_factor")]
    pub threshold_factor: f64,
    /// Normalized-spread level that opens a position (fixed strategy only).
    #[serde(default = "default_entry_z")]
    pub entry_z: f64,
    /// Normalized-spread level that closes a position (fixed strategy only).
    #[serde(default)]
    pub exit_z: f64,
    #[serde(default = "default_target_portfolio_size")]
    pub target_portfolio_size: usize,
    #[serde(default = "default_formation_months")]
    pub formation_months: u32,
    #[serde(default = "default_trading_months")]
    pub trading_months: u32,
    /// EM passes per pair (kalman strategy only).
    #[serde(default = "default_em_iterations")]
    pub em_iterations: usize,
    #[serde(default)]
    pub selection: SelectionConfig,
}

fn default_adf_significance() -> f64 {
    0.05
}

fn default_slope_significance() -> Option<f64> {
    Some(0.05)
}

fn default_transaction_cost() -> f64 {
    0.006
}

fn default_threshold_factor() -> f64 {
    1.0
}

fn default_entry_z() -> f64 {
    2.0
}

fn default_target_portfolio_size() -> usize {
    20
}

fn default_formation_months() -> u32 {
    24
}

fn default_trading_months() -> u32 {
    6
}

fn default_em_iterations() -> usize {
    20
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            use_transaction_costs: false,
            transaction_cost: default_transaction_cost(),
            threshold_factor: default_threshold_factor(),
            entry_z: default_entry_z(),
            exit_z: 0.0,
            target_portfolio_size: default_target_portfolio_size(),
            formation_months: default_formation_months(),
            trading_months: default_trading_months(),
            em_iterations: default_em_iterations(),
            selection: SelectionConfig::default(),
        }
    }
}

fn invalid(field: &str, reason: &str) -> StatArbError {
    StatArbError::InvalidConfiguration {
        field: field.into(),
        reason: reason.into(),
    }
}

fn is_probability(p: f64) -> bool {
    p.is_finite() && p > 0.0 && p <= 1.0
}

impl BacktestConfig {
    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> StatArbResult<()> {
        if self.formation_months == 0 {
            return Err(invalid("formation_months", "Formation length must be at least one month"));
        }
        if self.trading_months == 0 {
            return Err(invalid("trading_months", "Trading length must be at least one month"));
        }
        if !(self.transaction_cost.is_finite() && self.transaction_cost > 0.0) {
            return Err(invalid("transaction_cost", "Transaction cost must be positive"));
        }
        if !(self.threshold_factor.is_finite() && self.threshold_factor > 0.0) {
            return Err(invalid("threshold_factor", "Threshold factor must be positive"));
        }
        if !(self.exit_z.is_finite() && self.exit_z >= 0.0) {
            return Err(invalid("exit_z", "Exit level must be non-negative"));
        }
        if !(self.entry_z.is_finite() && self.entry_z > self.exit_z) {
            return Err(invalid("entry_z", "Entry level must exceed the exit level"));
        }
        if self.target_portfolio_size == 0 {
            return Err(invalid("target_portfolio_size", "Portfolio must hold at least one pair"));
        }
        if self.em_iterations == 0 {
            return Err(invalid("em_iterations", "EM needs at least one iteration"));
        }
        if !is_probability(self.selection.adf_significance) {
            return Err(invalid("selection.adf_significance", "Must lie in (0, 1]"));
        }
        if let Some(p) = self.selection.slope_significance {
            if !is_probability(p) {
                return Err(invalid("selection.slope_significance", "Must lie in (0, 1]"));
            }
        }
        Ok(())
    }

    /// Transaction cost actually charged per nonzero realized value.
    pub fn effective_cost(&self) -> Option<f64> {
        self.use_transaction_costs.then_some(self.transaction_cost)
    }
}
