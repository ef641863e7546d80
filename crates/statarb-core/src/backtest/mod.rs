pub mod orchestrator;
pub mod output;
pub mod window;

pub use orchestrator::{run_backtest, Backtester};
pub use output::{BacktestOutput, BacktestSummary, SeriesTable, WindowResult};
pub use window::{Window, WindowSchedule};
