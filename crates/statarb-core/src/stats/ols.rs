use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::f64::consts::PI;

use crate::{StatArbError, StatArbResult};

/// Ordinary least squares estimates and their inference statistics.
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub params: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub t_values: Vec<f64>,
    /// Two-sided Student-t p-values with `nobs - k` degrees of freedom.
    pub p_values: Vec<f64>,
    pub residuals: Vec<f64>,
    pub ssr: f64,
    pub nobs: usize,
    pub log_likelihood: f64,
    /// Akaike information criterion, `-2 llf + 2k`.
    pub aic: f64,
}

/// Fit `response = design * params + e` by least squares.
///
/// Fails when there are no residual degrees of freedom or `XᵀX` is not
/// positive definite (collinear or all-zero regressors).
pub fn ols(design: &DMatrix<f64>, response: &DVector<f64>) -> StatArbResult<OlsFit> {
    let nobs = design.nrows();
    let k = design.ncols();
    if response.len() != nobs {
        return Err(StatArbError::InvalidInput {
            field: "response".into(),
            reason: format!("{} observations for a {}-row design", response.len(), nobs),
        });
    }
    if nobs <= k {
        return Err(StatArbError::fit(
            "ols",
            format!("{} observations cannot identify {} parameters", nobs, k),
        ));
    }
    if design.iter().chain(response.iter()).any(|v| !v.is_finite()) {
        return Err(StatArbError::fit("ols", "non-finite input"));
    }

    let xt = design.transpose();
    let xtx = &xt * design;
    let chol = xtx
        .cholesky()
        .ok_or_else(|| StatArbError::fit("ols", "singular design matrix"))?;
    let params = chol.solve(&(&xt * response));
    let xtx_inv = chol.inverse();

    let residuals = response - design * &params;
    let ssr = residuals.dot(&residuals);
    let df_resid = (nobs - k) as f64;
    let sigma2 = ssr / df_resid;

    let t_dist = StudentsT::new(0.0, 1.0, df_resid)
        .map_err(|e| StatArbError::fit("ols", format!("Student-t setup: {e}")))?;

    let mut std_errors = Vec::with_capacity(k);
    let mut t_values = Vec::with_capacity(k);
    let mut p_values = Vec::with_capacity(k);
    for i in 0..k {
        let se = (sigma2 * xtx_inv[(i, i)]).max(0.0).sqrt();
        let t = params[i] / se;
        std_errors.push(se);
        t_values.push(t);
        p_values.push(two_sided_p(&t_dist, t));
    }

    let n = nobs as f64;
    let log_likelihood = -n / 2.0 * ((2.0 * PI).ln() + (ssr / n).ln() + 1.0);
    let aic = -2.0 * log_likelihood + 2.0 * k as f64;

    Ok(OlsFit {
        params: params.iter().copied().collect(),
        std_errors,
        t_values,
        p_values,
        residuals: residuals.iter().copied().collect(),
        ssr,
        nobs,
        log_likelihood,
        aic,
    })
}

fn two_sided_p(dist: &StudentsT, t: f64) -> f64 {
    if t.is_nan() {
        f64::NAN
    } else if t.is_infinite() {
        0.0
    } else {
        (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0)
    }
}

/// Regress `y` on `x` with no intercept: the hedge regression of one leg on
/// the other.
pub fn regress_through_origin(x: &[f64], y: &[f64]) -> StatArbResult<OlsFit> {
    let design = DMatrix::from_column_slice(x.len(), 1, x);
    let response = DVector::from_column_slice(y);
    ols(&design, &response)
}
