use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use super::state_space::StateSpaceParams;
use crate::{StatArbError, StatArbResult};

/// A simulated latent path and its noisy observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedPath {
    pub states: Vec<f64>,
    pub observations: Vec<f64>,
}

/// Draw `steps` points of the state-space process with a seeded RNG.
///
/// `x[0] ~ N(0, 1)`, then `x[t] = A + B·x[t-1] + C·ε` and `y[t] = x[t] + D·η`.
pub fn simulate_state_space(
    params: &StateSpaceParams,
    steps: usize,
    seed: u64,
) -> StatArbResult<SimulatedPath> {
    if steps == 0 {
        return Err(StatArbError::InvalidInput {
            field: "steps".into(),
            reason: "Must simulate at least one step".into(),
        });
    }
    if !(params.c >= 0.0 && params.d >= 0.0) {
        return Err(StatArbError::InvalidInput {
            field: "params".into(),
            reason: "Noise scales C and D must be non-negative".into(),
        });
    }
    let unit = Normal::new(0.0, 1.0).map_err(|e| StatArbError::InvalidInput {
        field: "params".into(),
        reason: format!("Invalid Normal parameters: {e}"),
    })?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut states = Vec::with_capacity(steps);
    let mut x: f64 = rng.sample(&unit);
    states.push(x);
    for _ in 1..steps {
        x = params.a + params.b * x + params.c * rng.sample(&unit);
        states.push(x);
    }
    let observations = states
        .iter()
        .map(|s| s + params.d * rng.sample(&unit))
        .collect();

    Ok(SimulatedPath {
        states,
        observations,
    })
}
