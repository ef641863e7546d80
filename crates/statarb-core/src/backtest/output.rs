use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::window::Window;
use crate::config::StrategyKind;
use crate::selection::{Portfolio, SelectionReport};

/// Everything produced for one rolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub window: Window,
    pub portfolio: Portfolio,
    pub selection: SelectionReport,
    /// Trading-window calendar.
    pub dates: Vec<NaiveDate>,
    /// Sum of all traded pairs' realized values per date.
    pub returns: Vec<f64>,
    /// Number of pairs with a nonzero realized value per date.
    pub trade_counts: Vec<usize>,
    pub pairs_traded: usize,
    /// Pairs dropped after selection because their model or data failed.
    pub pairs_skipped: usize,
    /// Pairs force-closed at a loss.
    pub diverged: usize,
}

impl WindowResult {
    pub fn total_return(&self) -> f64 {
        self.returns.iter().sum()
    }

    pub fn total_trades(&self) -> usize {
        self.trade_counts.iter().sum()
    }
}

/// A date-indexed table with one column per trading window.
///
/// The index is the union of every window's dates; a cell is `None` where the
/// window has no row for that date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesTable {
    pub index: Vec<NaiveDate>,
    /// Trading-window start date of each column.
    pub columns: Vec<NaiveDate>,
    /// `cells[col][row]`.
    pub cells: Vec<Vec<Option<f64>>>,
}

impl SeriesTable {
    fn build<F>(windows: &[WindowResult], value: F) -> Self
    where
        F: Fn(&WindowResult, usize) -> f64,
    {
        let index: Vec<NaiveDate> = windows
            .iter()
            .flat_map(|w| w.dates.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let cells = windows
            .iter()
            .map(|w| {
                let mut column = vec![None; index.len()];
                for (i, date) in w.dates.iter().enumerate() {
                    if let Ok(row) = index.binary_search(date) {
                        column[row] = Some(value(w, i));
                    }
                }
                column
            })
            .collect();

        Self {
            index,
            columns: windows.iter().map(|w| w.window.trading_start).collect(),
            cells,
        }
    }

    /// Header label of a column.
    pub fn column_label(&self, col: usize) -> String {
        format!("Portfolio_{}", self.columns[col])
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(col).and_then(|c| c.get(row).copied().flatten())
    }

    /// One row across every column.
    pub fn row(&self, row: usize) -> Vec<Option<f64>> {
        (0..self.columns.len()).map(|c| self.get(row, c)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Headline numbers across all evaluated windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub strategy: StrategyKind,
    pub windows: usize,
    pub skipped_windows: usize,
    pub total_return: f64,
    pub total_trades: usize,
    pub diverged_pairs: usize,
    pub mean_portfolio_size: f64,
}

/// Ordered per-window results of a full run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutput {
    pub strategy: StrategyKind,
    pub windows: Vec<WindowResult>,
    /// Windows that could not be evaluated, e.g. no trading dates.
    pub skipped: Vec<Window>,
}

impl BacktestOutput {
    /// Daily portfolio return per window.
    pub fn returns_table(&self) -> SeriesTable {
        SeriesTable::build(&self.windows, |w, i| w.returns[i])
    }

    /// Daily trade count per window.
    pub fn trade_count_table(&self) -> SeriesTable {
        SeriesTable::build(&self.windows, |w, i| w.trade_counts[i] as f64)
    }

    pub fn summary(&self) -> BacktestSummary {
        let n = self.windows.len();
        let pairs: usize = self.windows.iter().map(|w| w.portfolio.len()).sum();
        BacktestSummary {
            strategy: self.strategy,
            windows: n,
            skipped_windows: self.skipped.len(),
            total_return: self.windows.iter().map(WindowResult::total_return).sum(),
            total_trades: self.windows.iter().map(WindowResult::total_trades).sum(),
            diverged_pairs: self.windows.iter().map(|w| w.diverged).sum(),
            mean_portfolio_size: if n == 0 { 0.0 } else { pairs as f64 / n as f64 },
        }
    }
}
