use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::universe::PriceUniverse;

/// Formation period followed immediately by a trading period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Window {
    pub formation_start: NaiveDate,
    pub formation_end: NaiveDate,
    pub trading_start: NaiveDate,
    pub trading_end: NaiveDate,
}

impl Window {
    /// Window whose formation starts on `start`. `None` if the calendar
    /// arithmetic overflows.
    pub fn starting(start: NaiveDate, formation_months: u32, trading_months: u32) -> Option<Self> {
        let trading_start = start.checked_add_months(Months::new(formation_months))?;
        let formation_end = trading_start.pred_opt()?;
        let trading_end = trading_start
            .checked_add_months(Months::new(trading_months))?
            .pred_opt()?;
        Some(Self {
            formation_start: start,
            formation_end,
            trading_start,
            trading_end,
        })
    }
}

/// Monthly rolling windows over a universe, in chronological order.
///
/// One candidate per calendar month present in the data, starting on the
/// 1st. The schedule ends at the first window whose trading period runs past
/// the last available date.
#[derive(Debug, Clone)]
pub struct WindowSchedule {
    months: std::vec::IntoIter<NaiveDate>,
    last_date: NaiveDate,
    formation_months: u32,
    trading_months: u32,
    exhausted: bool,
}

impl WindowSchedule {
    pub fn new(universe: &PriceUniverse, formation_months: u32, trading_months: u32) -> Self {
        Self {
            months: universe.months().into_iter(),
            last_date: universe.last_date(),
            formation_months,
            trading_months,
            exhausted: false,
        }
    }
}

impl Iterator for WindowSchedule {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.exhausted {
            return None;
        }
        let window = self
            .months
            .next()
            .and_then(|m| Window::starting(m, self.formation_months, self.trading_months))
            .filter(|w| w.trading_end <= self.last_date);
        if window.is_none() {
            self.exhausted = true;
        }
        window
    }
}

impl std::iter::FusedIterator for WindowSchedule {}
