pub mod backtest;
pub mod config;
pub mod error;
pub mod model;
pub mod selection;
pub mod stats;
pub mod trading;
pub mod types;
pub mod universe;

pub use config::{BacktestConfig, FailedFitPolicy, SelectionConfig, StrategyKind};
pub use error::StatArbError;
pub use types::*;

/// Standard result type for all statarb operations
pub type StatArbResult<T> = Result<T, StatArbError>;
