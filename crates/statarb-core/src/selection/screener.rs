use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::stats::sum_squared_differences;
use crate::types::PairId;
use crate::universe::NormalizedSlice;

/// A pair of instruments and its sum of squared normalized-price differences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairCandidate {
    pub pair: PairId,
    pub distance: f64,
}

/// Rank every unordered pair of complete columns by ascending distance.
///
/// Pairs where either leg has a missing observation anywhere in the slice are
/// left out. Ties keep lexicographic pair order so the ranking is stable.
pub fn rank_pairs(slice: &NormalizedSlice) -> Vec<PairCandidate> {
    let tickers = slice.tickers();
    let complete: Vec<Option<Vec<f64>>> = slice
        .columns()
        .iter()
        .map(|column| column.iter().copied().collect::<Option<Vec<f64>>>())
        .collect();

    let mut candidates = Vec::new();
    for i in 0..tickers.len() {
        for j in (i + 1)..tickers.len() {
            let (Some(a), Some(b)) = (&complete[i], &complete[j]) else {
                trace!(leg1 = %tickers[i], leg2 = %tickers[j], "Skipping pair with data gap");
                continue;
            };
            candidates.push(PairCandidate {
                pair: PairId::new(tickers[i].clone(), tickers[j].clone()),
                distance: sum_squared_differences(a, b),
            });
        }
    }

    candidates.sort_by(|x, y| {
        x.distance
            .total_cmp(&y.distance)
            .then_with(|| x.pair.cmp(&y.pair))
    });
    candidates
}
