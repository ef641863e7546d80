pub mod backtest;
pub mod model;
pub mod selection;
