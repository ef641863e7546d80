//! Linear-Gaussian state-space spread model fitted by Expectation-Maximization.
//!
//! ```text
//! x[t] = A + B·x[t-1] + C·ε[t]     (latent spread)
//! y[t] = x[t] + D·η[t]             (observed residual)
//! ```
//!
//! The observation loading is fixed at 1 with no offset, and the prior on the
//! first state is N(0, 1). EM estimates A, B, C² and D² with the
//! Shumway-Stoffer updates: a forward Kalman pass, a Rauch-Tung-Striebel
//! backward pass with lag-one covariances, then closed-form M-step updates in
//! the order D², B, C², A.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

use crate::selection::SelectedPair;
use crate::universe::NormalizedSlice;
use crate::{StatArbError, StatArbResult};

const INITIAL_STATE_MEAN: f64 = 0.0;
const INITIAL_STATE_VARIANCE: f64 = 1.0;

/// Model scalars. `c` and `d` are noise scales (standard deviations).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateSpaceParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl StateSpaceParams {
    /// Starting point for EM: identity transition, unit noise.
    pub fn em_start() -> Self {
        Self {
            a: 0.0,
            b: 1.0,
            c: 1.0,
            d: 1.0,
        }
    }

    pub fn transition_variance(&self) -> f64 {
        self.c * self.c
    }

    pub fn observation_variance(&self) -> f64 {
        self.d * self.d
    }
}

/// Forward-pass output of the Kalman filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOutput {
    pub predicted_means: Vec<f64>,
    pub predicted_variances: Vec<f64>,
    pub filtered_means: Vec<f64>,
    pub filtered_variances: Vec<f64>,
    /// Marginal log-likelihood of the observations.
    pub log_likelihood: f64,
}

/// Result of an EM run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmFit {
    pub params: StateSpaceParams,
    pub iterations: usize,
    /// Log-likelihood evaluated at the start of every iteration.
    pub log_likelihood_history: Vec<f64>,
    /// Log-likelihood of the final parameters.
    pub log_likelihood: f64,
}

/// Filter `observations` under `params`.
pub fn filter(params: &StateSpaceParams, observations: &[f64]) -> FilterOutput {
    run_filter(
        params.a,
        params.b,
        params.transition_variance(),
        params.observation_variance(),
        observations,
    )
}

fn run_filter(a: f64, b: f64, q: f64, r: f64, observations: &[f64]) -> FilterOutput {
    let n = observations.len();
    let mut out = FilterOutput {
        predicted_means: Vec::with_capacity(n),
        predicted_variances: Vec::with_capacity(n),
        filtered_means: Vec::with_capacity(n),
        filtered_variances: Vec::with_capacity(n),
        log_likelihood: 0.0,
    };

    for (t, &y) in observations.iter().enumerate() {
        let (m_pred, p_pred) = if t == 0 {
            (INITIAL_STATE_MEAN, INITIAL_STATE_VARIANCE)
        } else {
            (
                a + b * out.filtered_means[t - 1],
                b * b * out.filtered_variances[t - 1] + q,
            )
        };
        let s = p_pred + r;
        let innovation = y - m_pred;
        let gain = if s > 0.0 { p_pred / s } else { 0.0 };

        if s > 0.0 {
            out.log_likelihood -= 0.5 * ((2.0 * PI * s).ln() + innovation * innovation / s);
        } else if innovation != 0.0 {
            out.log_likelihood = f64::NEG_INFINITY;
        }

        out.predicted_means.push(m_pred);
        out.predicted_variances.push(p_pred);
        out.filtered_means.push(m_pred + gain * innovation);
        out.filtered_variances.push(p_pred - gain * p_pred);
    }
    out
}

struct Smoothed {
    means: Vec<f64>,
    variances: Vec<f64>,
    /// `Cov(x[t], x[t-1] | y)`; index 0 is unused.
    lag_one_covariances: Vec<f64>,
}

fn smooth(b: f64, filtered: &FilterOutput) -> Smoothed {
    let n = filtered.filtered_means.len();
    let mut means = filtered.filtered_means.clone();
    let mut variances = filtered.filtered_variances.clone();
    let mut gains = vec![0.0; n];

    for t in (0..n.saturating_sub(1)).rev() {
        let p_next = filtered.predicted_variances[t + 1];
        let j = if p_next > 0.0 {
            filtered.filtered_variances[t] * b / p_next
        } else {
            0.0
        };
        means[t] =
            filtered.filtered_means[t] + j * (means[t + 1] - filtered.predicted_means[t + 1]);
        variances[t] = filtered.filtered_variances[t] + j * j * (variances[t + 1] - p_next);
        gains[t] = j;
    }

    let mut lag_one_covariances = vec![0.0; n];
    for t in 1..n {
        lag_one_covariances[t] = variances[t] * gains[t - 1];
    }

    Smoothed {
        means,
        variances,
        lag_one_covariances,
    }
}

/// Fit A, B, C, D to `observations` with `iterations` EM passes.
pub fn fit_em(observations: &[f64], iterations: usize) -> StatArbResult<EmFit> {
    if iterations == 0 {
        return Err(StatArbError::InvalidInput {
            field: "iterations".into(),
            reason: "EM needs at least one iteration".into(),
        });
    }
    let n = observations.len();
    if n < 2 {
        return Err(StatArbError::InsufficientData(format!(
            "EM needs at least 2 observations, got {}",
            n
        )));
    }
    if observations.iter().any(|v| !v.is_finite()) {
        return Err(StatArbError::fit("em", "observations contain non-finite values"));
    }

    let start = StateSpaceParams::em_start();
    let (mut a, mut b) = (start.a, start.b);
    let (mut q, mut r) = (start.transition_variance(), start.observation_variance());
    let mut history = Vec::with_capacity(iterations);
    let nf = n as f64;
    let transitions = (n - 1) as f64;

    for _ in 0..iterations {
        // E-step
        let filtered = run_filter(a, b, q, r, observations);
        history.push(filtered.log_likelihood);
        let s = smooth(b, &filtered);
        let (ms, ps, pc) = (&s.means, &s.variances, &s.lag_one_covariances);

        // M-step
        r = observations
            .iter()
            .zip(ms.iter().zip(ps))
            .map(|(y, (m, p))| (y - m) * (y - m) + p)
            .sum::<f64>()
            / nf;

        let (mut num, mut den) = (0.0, 0.0);
        for t in 1..n {
            num += pc[t] + ms[t] * ms[t - 1] - a * ms[t - 1];
            den += ps[t - 1] + ms[t - 1] * ms[t - 1];
        }
        b = if den != 0.0 { num / den } else { 0.0 };

        q = (0..n - 1)
            .map(|t| {
                let err = ms[t + 1] - b * ms[t] - a;
                err * err + b * b * ps[t] + ps[t + 1] - 2.0 * b * pc[t + 1]
            })
            .sum::<f64>()
            / transitions;

        a = (1..n).map(|t| ms[t] - b * ms[t - 1]).sum::<f64>() / transitions;
    }

    if ![a, b, q, r].iter().all(|v| v.is_finite()) || q < 0.0 || r < 0.0 {
        return Err(StatArbError::fit(
            "em",
            format!("degenerate estimates A={a} B={b} C²={q} D²={r}"),
        ));
    }

    let params = StateSpaceParams {
        a,
        b,
        c: q.sqrt(),
        d: r.sqrt(),
    };
    let log_likelihood = filter(&params, observations).log_likelihood;
    debug!(
        a = params.a,
        b = params.b,
        c = params.c,
        d = params.d,
        log_likelihood,
        "EM fit complete"
    );

    Ok(EmFit {
        params,
        iterations,
        log_likelihood_history: history,
        log_likelihood,
    })
}

/// A selected pair's hedge ratio with the state-space model of its spread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateSpaceModel {
    pub beta: f64,
    pub params: StateSpaceParams,
}

impl StateSpaceModel {
    /// Re-derive the formation residual `leg2 - beta * leg1` and fit it.
    pub fn estimate(
        formation: &NormalizedSlice,
        pair: &SelectedPair,
        iterations: usize,
    ) -> StatArbResult<Self> {
        let legs = formation.aligned(&pair.pair.leg1, &pair.pair.leg2)?;
        let residuals = legs.spread(pair.beta);
        let fit = fit_em(&residuals, iterations)?;
        Ok(Self {
            beta: pair.beta,
            params: fit.params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use statrs::distribution::Normal;

    fn ar1_with_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let unit = Normal::new(0.0, 1.0).unwrap();
        let mut x = 0.0;
        (0..n)
            .map(|_| {
                x = 0.2 + 0.8 * x + rng.sample(&unit);
                x + 0.5 * rng.sample(&unit)
            })
            .collect()
    }

    #[test]
    fn test_filter_first_step_uses_prior() {
        let params = StateSpaceParams::em_start();
        let out = filter(&params, &[2.0]);
        // Prior N(0, 1), R = 1: gain 0.5
        assert_eq!(out.predicted_means[0], 0.0);
        assert_eq!(out.filtered_means[0], 1.0);
        assert_eq!(out.filtered_variances[0], 0.5);
    }

    #[test]
    fn test_noiseless_observation_is_tracked_exactly() {
        let params = StateSpaceParams {
            a: 0.0,
            b: 1.0,
            c: 1.0,
            d: 0.0,
        };
        let obs = [3.0, -1.0, 4.0];
        let out = filter(&params, &obs);
        assert_eq!(out.filtered_means, obs.to_vec());
        assert!(out.filtered_variances.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_em_log_likelihood_never_decreases() {
        let obs = ar1_with_noise(300, 17);
        let fit = fit_em(&obs, 30).unwrap();
        assert_eq!(fit.log_likelihood_history.len(), 30);
        for w in fit.log_likelihood_history.windows(2) {
            assert!(w[1] >= w[0] - 1e-8 * w[0].abs(), "{} then {}", w[0], w[1]);
        }
        assert!(fit.log_likelihood >= fit.log_likelihood_history[29] - 1e-6);
    }

    #[test]
    fn test_em_estimates_are_valid() {
        let obs = ar1_with_noise(250, 3);
        let fit = fit_em(&obs, 20).unwrap();
        assert!(fit.params.c >= 0.0 && fit.params.d >= 0.0);
        assert!(fit.params.b.abs() < 1.5);
    }

    #[test]
    fn test_em_rejects_short_or_bad_input() {
        assert!(matches!(
            fit_em(&[1.0], 10),
            Err(StatArbError::InsufficientData(_))
        ));
        assert!(matches!(
            fit_em(&[1.0, f64::NAN, 2.0], 10),
            Err(StatArbError::FitFailure { .. })
        ));
        assert!(fit_em(&[1.0, 2.0, 3.0], 0).is_err());
    }
}
