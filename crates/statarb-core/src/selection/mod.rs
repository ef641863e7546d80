//! Formation-window pair selection: distance ranking followed by an
//! Engle-Granger cointegration gate.

pub mod cointegration;
pub mod screener;

pub use cointegration::{
    evaluate_candidate, select_pairs, test_cointegration, CointegrationResult, Portfolio,
    SelectedPair, SelectionReport, Verdict,
};
pub use screener::{rank_pairs, PairCandidate};
