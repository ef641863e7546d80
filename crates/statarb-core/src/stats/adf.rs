//! Augmented Dickey-Fuller unit-root test with a constant term.
//!
//! The lag order is picked by AIC over a common estimation sample, then the
//! test regression is re-run on the longest sample the chosen lag allows:
//!
//! ```text
//! Δy[t] = γ·y[t-1] + Σ_{j=1..p} φ_j·Δy[t-j] + c + e[t]
//! ```
//!
//! The statistic is the t-value of γ. P-values come from the MacKinnon (1994)
//! response surface for a single series with constant.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use super::ols::ols;
use crate::{StatArbError, StatArbResult};

// MacKinnon (1994) surface, regression with constant, N = 1.
const TAU_MAX_C: f64 = 2.74;
const TAU_MIN_C: f64 = -18.83;
const TAU_STAR_C: f64 = -1.61;
const TAU_SMALLP_C: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGEP_C: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    /// Number of lagged differences in the final regression.
    pub used_lag: usize,
    /// Observations in the final regression.
    pub nobs: usize,
    pub max_lag: usize,
    /// AIC of the selected lag on the common sample.
    pub best_aic: f64,
}

/// Run the ADF test on `series` with automatic (AIC) lag selection.
pub fn adf_test(series: &[f64]) -> StatArbResult<AdfResult> {
    let n = series.len();
    if series.iter().any(|v| !v.is_finite()) {
        return Err(StatArbError::fit("adf", "series contains non-finite values"));
    }
    let (lo, hi) = series
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if n > 0 && lo == hi {
        return Err(StatArbError::fit("adf", "series is constant"));
    }

    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as i64;
    let cap = (n / 2) as i64 - 2;
    let max_lag = schwert.min(cap);
    if max_lag < 0 {
        return Err(StatArbError::InsufficientData(format!(
            "ADF test needs more than {} observations",
            n
        )));
    }
    let max_lag = max_lag as usize;

    let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    // Common sample for every candidate lag: rows t = max_lag .. diffs.len().
    let (full, response) = lagged_design(series, &diffs, max_lag, true);
    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let cols = lag + 2;
        let design = full.columns(0, cols).into_owned();
        let fit = match ols(&design, &response) {
            Ok(fit) => fit,
            Err(_) => continue,
        };
        // Strict comparison keeps the shortest lag on ties.
        if best.map_or(true, |(aic, _)| fit.aic < aic) {
            best = Some((fit.aic, lag));
        }
    }
    let (best_aic, used_lag) =
        best.ok_or_else(|| StatArbError::fit("adf", "no lag order could be estimated"))?;

    let (design, response) = lagged_design(series, &diffs, used_lag, false);
    let fit = ols(&design, &response)?;
    let statistic = fit.t_values[0];
    if statistic.is_nan() {
        return Err(StatArbError::fit("adf", "undefined test statistic"));
    }

    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic),
        used_lag,
        nobs: fit.nobs,
        max_lag,
        best_aic,
    })
}

/// Build the ADF regression for `lag` lagged differences.
///
/// With `constant_first` the columns are `[1, y[t-1], Δy[t-1..t-lag]]`,
/// otherwise `[y[t-1], Δy[t-1..t-lag], 1]`; the response is `Δy[t]`.
fn lagged_design(
    series: &[f64],
    diffs: &[f64],
    lag: usize,
    constant_first: bool,
) -> (DMatrix<f64>, DVector<f64>) {
    let rows = diffs.len() - lag;
    let cols = lag + 2;
    let mut design = DMatrix::zeros(rows, cols);
    let mut response = DVector::zeros(rows);
    let offset = usize::from(constant_first);
    for r in 0..rows {
        let t = lag + r;
        response[r] = diffs[t];
        design[(r, offset)] = series[t];
        for j in 1..=lag {
            design[(r, offset + j)] = diffs[t - j];
        }
        let constant_col = if constant_first { 0 } else { cols - 1 };
        design[(r, constant_col)] = 1.0;
    }
    (design, response)
}

/// Approximate p-value of an ADF statistic (constant, one series).
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic > TAU_MAX_C {
        return 1.0;
    }
    if statistic < TAU_MIN_C {
        return 0.0;
    }
    let z = if statistic <= TAU_STAR_C {
        polyval(&TAU_SMALLP_C, statistic)
    } else {
        polyval(&TAU_LARGEP_C, statistic)
    };
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.cdf(z),
        Err(_) => f64::NAN,
    }
}

/// `c[0] + c[1] x + c[2] x² + ...`
fn polyval(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}
