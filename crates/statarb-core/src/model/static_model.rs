use serde::{Deserialize, Serialize};

use crate::selection::SelectedPair;
use crate::{StatArbError, StatArbResult};

/// Hedge ratio plus the formation residual's mean and population sd.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticSpreadModel {
    pub beta: f64,
    pub mean: f64,
    pub sd: f64,
}

impl StaticSpreadModel {
    pub fn from_selected(pair: &SelectedPair) -> StatArbResult<Self> {
        if !(pair.residual_sd.is_finite() && pair.residual_sd > 0.0) {
            return Err(StatArbError::fit(
                "static spread model",
                format!("residual sd {} for {}", pair.residual_sd, pair.pair),
            ));
        }
        Ok(Self {
            beta: pair.beta,
            mean: pair.residual_mean,
            sd: pair.residual_sd,
        })
    }

    /// `(raw - mean) / sd`
    pub fn z_score(&self, raw: f64) -> f64 {
        (raw - self.mean) / self.sd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PairId;

    fn selected(sd: f64) -> SelectedPair {
        SelectedPair {
            pair: PairId::new("A", "B"),
            distance: 0.1,
            beta: 1.2,
            residual_mean: 0.5,
            residual_sd: sd,
            adf_p_value: 0.01,
        }
    }

    #[test]
    fn test_z_score() {
        let model = StaticSpreadModel::from_selected(&selected(2.0)).unwrap();
        assert_eq!(model.z_score(4.5), 2.0);
        assert_eq!(model.z_score(0.5), 0.0);
    }

    #[test]
    fn test_zero_sd_is_fit_failure() {
        assert!(StaticSpreadModel::from_selected(&selected(0.0)).is_err());
    }
}
