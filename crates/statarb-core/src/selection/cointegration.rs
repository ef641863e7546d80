use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::screener::PairCandidate;
use crate::config::{FailedFitPolicy, SelectionConfig};
use crate::stats::{adf_test, mean, population_std, regress_through_origin};
use crate::types::PairId;
use crate::universe::NormalizedSlice;
use crate::{StatArbError, StatArbResult};

/// Outcome of the two-step Engle-Granger test for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CointegrationResult {
    pub pair: PairId,
    /// Slope of the no-intercept regression of leg2 on leg1.
    pub beta: f64,
    pub slope_p_value: f64,
    /// `leg2 - beta * leg1` on the aligned formation dates.
    pub residuals: Vec<f64>,
    /// `None` when the slope gate stopped the test before the ADF step.
    pub adf_p_value: Option<f64>,
}

/// A pair admitted to the portfolio with its formation-window spread
/// statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedPair {
    pub pair: PairId,
    pub distance: f64,
    pub beta: f64,
    pub residual_mean: f64,
    /// Population standard deviation of the residuals.
    pub residual_sd: f64,
    pub adf_p_value: f64,
}

/// Ordered set of accepted pairs; frozen once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub pairs: Vec<SelectedPair>,
}

impl Portfolio {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Tally of what happened to the ranked candidates of one window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub candidates_ranked: usize,
    pub candidates_tested: usize,
    pub accepted: usize,
    pub slope_not_significant: usize,
    pub not_stationary: usize,
    pub fit_failures: usize,
    /// Portfolio slots used up by failed fits under `ConsumeSlot`.
    pub slots_consumed: usize,
}

/// Decision for one candidate.
#[derive(Debug)]
pub enum Verdict {
    Accepted(SelectedPair),
    SlopeNotSignificant { p_value: f64 },
    NotStationary { p_value: f64 },
    FitFailed(StatArbError),
}

/// Run the regression and, unless the slope gate stops it, the ADF test.
pub fn test_cointegration(
    slice: &NormalizedSlice,
    pair: &PairId,
    config: &SelectionConfig,
) -> StatArbResult<CointegrationResult> {
    let legs = slice.aligned(&pair.leg1, &pair.leg2)?;
    let fit = regress_through_origin(&legs.leg1, &legs.leg2)?;
    let beta = fit.params[0];
    let slope_p_value = fit.p_values[0];
    if !beta.is_finite() {
        return Err(StatArbError::fit("hedge regression", "undefined slope"));
    }

    let gate_open = match config.slope_significance {
        Some(limit) => !slope_p_value.is_nan() && slope_p_value <= limit,
        None => true,
    };
    let adf_p_value = if gate_open {
        Some(adf_test(&fit.residuals)?.p_value)
    } else {
        None
    };

    Ok(CointegrationResult {
        pair: pair.clone(),
        beta,
        slope_p_value,
        residuals: fit.residuals,
        adf_p_value,
    })
}

/// Classify one ranked candidate.
pub fn evaluate_candidate(
    slice: &NormalizedSlice,
    candidate: &PairCandidate,
    config: &SelectionConfig,
) -> Verdict {
    let result = match test_cointegration(slice, &candidate.pair, config) {
        Ok(r) => r,
        Err(e) => return Verdict::FitFailed(e),
    };
    let Some(adf_p) = result.adf_p_value else {
        return Verdict::SlopeNotSignificant {
            p_value: result.slope_p_value,
        };
    };
    if adf_p.is_nan() || adf_p >= config.adf_significance {
        return Verdict::NotStationary { p_value: adf_p };
    }

    Verdict::Accepted(SelectedPair {
        pair: result.pair,
        distance: candidate.distance,
        beta: result.beta,
        residual_mean: mean(&result.residuals),
        residual_sd: population_std(&result.residuals),
        adf_p_value: adf_p,
    })
}

/// Walk the ranked candidates until `target` pairs are accepted or the list
/// runs out. A short portfolio is a normal outcome.
pub fn select_pairs(
    slice: &NormalizedSlice,
    candidates: &[PairCandidate],
    target: usize,
    config: &SelectionConfig,
) -> (Portfolio, SelectionReport) {
    let mut portfolio = Portfolio::default();
    let mut report = SelectionReport {
        candidates_ranked: candidates.len(),
        ..Default::default()
    };

    for candidate in candidates {
        if portfolio.len() + report.slots_consumed >= target {
            break;
        }
        report.candidates_tested += 1;

        match evaluate_candidate(slice, candidate, config) {
            Verdict::Accepted(selected) => {
                debug!(
                    pair = %selected.pair,
                    beta = selected.beta,
                    adf_p = selected.adf_p_value,
                    "Pair accepted"
                );
                report.accepted += 1;
                portfolio.pairs.push(selected);
            }
            Verdict::SlopeNotSignificant { p_value } => {
                debug!(pair = %candidate.pair, slope_p = p_value, "No significant hedge slope");
                report.slope_not_significant += 1;
            }
            Verdict::NotStationary { p_value } => {
                debug!(pair = %candidate.pair, adf_p = p_value, "Residual not stationary");
                report.not_stationary += 1;
            }
            Verdict::FitFailed(e) => {
                warn!(pair = %candidate.pair, error = %e, "Cointegration fit failed");
                report.fit_failures += 1;
                if config.failed_fit_policy == FailedFitPolicy::ConsumeSlot {
                    report.slots_consumed += 1;
                }
            }
        }
    }

    (portfolio, report)
}
