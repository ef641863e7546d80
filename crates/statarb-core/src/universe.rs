//! Immutable date-indexed price table and its per-window normalized views.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{StatArbError, StatArbResult};

/// Prices for N instruments on a shared, strictly increasing calendar.
///
/// Column-major: `columns[j][i]` is the price of `tickers[j]` on `dates[i]`.
/// Leading `None`s mark instruments that were not yet listed.
/// Deserialization goes through [`PriceUniverse::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawPriceUniverse")]
pub struct PriceUniverse {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl PriceUniverse {
    /// Build a universe from a calendar and `(ticker, prices)` columns.
    ///
    /// Non-finite and non-positive prices are stored as missing.
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<Option<f64>>)>,
    ) -> StatArbResult<Self> {
        if dates.is_empty() {
            return Err(StatArbError::InvalidInput {
                field: "dates".into(),
                reason: "Price table has no dates".into(),
            });
        }
        if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(StatArbError::InvalidInput {
                field: "dates".into(),
                reason: format!("Dates must be strictly increasing ({} then {})", w[0], w[1]),
            });
        }

        let mut seen = HashSet::new();
        let mut tickers = Vec::with_capacity(columns.len());
        let mut prices = Vec::with_capacity(columns.len());
        for (ticker, column) in columns {
            if ticker.trim().is_empty() {
                return Err(StatArbError::InvalidInput {
                    field: "tickers".into(),
                    reason: "Instrument identifiers must be non-empty".into(),
                });
            }
            if !seen.insert(ticker.clone()) {
                return Err(StatArbError::InvalidInput {
                    field: "tickers".into(),
                    reason: format!("Duplicate instrument identifier '{}'", ticker),
                });
            }
            if column.len() != dates.len() {
                return Err(StatArbError::InvalidInput {
                    field: ticker,
                    reason: format!(
                        "Column has {} prices but the calendar has {} dates",
                        column.len(),
                        dates.len()
                    ),
                });
            }
            let cleaned = column
                .into_iter()
                .map(|p| p.filter(|v| v.is_finite() && *v > 0.0))
                .collect();
            tickers.push(ticker);
            prices.push(cleaned);
        }

        Ok(Self {
            dates,
            tickers,
            columns: prices,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Raw prices of one instrument, if present.
    pub fn column(&self, ticker: &str) -> Option<&[Option<f64>]> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|j| self.columns[j].as_slice())
    }

    /// First day of every calendar month that has at least one observation.
    pub fn months(&self) -> Vec<NaiveDate> {
        let mut months: Vec<NaiveDate> = Vec::new();
        for d in &self.dates {
            let first = d.with_day(1).unwrap_or(*d);
            if months.last() != Some(&first) {
                months.push(first);
            }
        }
        months
    }

    /// Prices between `start` and `end` inclusive, every column divided by its
    /// first non-missing value inside the range.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> StatArbResult<NormalizedSlice> {
        let (lo, hi) = row_range(&self.dates, start, end)?;
        let columns = self
            .columns
            .iter()
            .map(|col| {
                let rows = &col[lo..hi];
                match rows.iter().flatten().next().copied() {
                    Some(anchor) => rows.iter().map(|p| p.map(|v| v / anchor)).collect(),
                    None => vec![None; rows.len()],
                }
            })
            .collect();

        Ok(NormalizedSlice {
            dates: self.dates[lo..hi].to_vec(),
            tickers: self.tickers.clone(),
            columns,
        })
    }
}

#[derive(Deserialize)]
struct RawPriceUniverse {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl TryFrom<RawPriceUniverse> for PriceUniverse {
    type Error = StatArbError;

    fn try_from(raw: RawPriceUniverse) -> StatArbResult<Self> {
        if raw.tickers.len() != raw.columns.len() {
            return Err(StatArbError::InvalidInput {
                field: "columns".into(),
                reason: format!(
                    "{} tickers but {} price columns",
                    raw.tickers.len(),
                    raw.columns.len()
                ),
            });
        }
        PriceUniverse::new(raw.dates, raw.tickers.into_iter().zip(raw.columns).collect())
    }
}

/// Half-open row range `[lo, hi)` of the dates falling inside `[start, end]`.
fn row_range(
    dates: &[NaiveDate],
    start: NaiveDate,
    end: NaiveDate,
) -> StatArbResult<(usize, usize)> {
    if start > end {
        return Err(StatArbError::EmptyWindow { start, end });
    }
    let lo = dates.partition_point(|d| *d < start);
    let hi = dates.partition_point(|d| *d <= end);
    if lo >= hi {
        return Err(StatArbError::EmptyWindow { start, end });
    }
    Ok((lo, hi))
}

/// A window of prices rescaled so every instrument starts at 1.0.
/// Only built by slicing a [`PriceUniverse`].
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedSlice {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl NormalizedSlice {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Every column, in ticker order.
    pub fn columns(&self) -> &[Vec<Option<f64>>] {
        &self.columns
    }

    pub fn column(&self, ticker: &str) -> Option<&[Option<f64>]> {
        self.tickers
            .iter()
            .position(|t| t == ticker)
            .map(|j| self.columns[j].as_slice())
    }

    /// Rows of `[start, end]` without re-normalizing: values keep the anchor
    /// of the parent slice.
    pub fn sub_slice(&self, start: NaiveDate, end: NaiveDate) -> StatArbResult<NormalizedSlice> {
        let (lo, hi) = row_range(&self.dates, start, end)?;
        Ok(NormalizedSlice {
            dates: self.dates[lo..hi].to_vec(),
            tickers: self.tickers.clone(),
            columns: self.columns.iter().map(|c| c[lo..hi].to_vec()).collect(),
        })
    }

    /// The two legs restricted to rows where both are present.
    pub fn aligned(&self, leg1: &str, leg2: &str) -> StatArbResult<AlignedLegs> {
        let a = self.column(leg1).ok_or_else(|| unknown_ticker(leg1))?;
        let b = self.column(leg2).ok_or_else(|| unknown_ticker(leg2))?;

        let mut legs = AlignedLegs::default();
        for ((date, x), y) in self.dates.iter().zip(a).zip(b) {
            if let (Some(x), Some(y)) = (x, y) {
                legs.dates.push(*date);
                legs.leg1.push(*x);
                legs.leg2.push(*y);
            }
        }
        Ok(legs)
    }
}

fn unknown_ticker(ticker: &str) -> StatArbError {
    StatArbError::InvalidInput {
        field: "ticker".into(),
        reason: format!("Unknown instrument '{}'", ticker),
    }
}

/// Paired observations of two instruments on their common dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedLegs {
    pub dates: Vec<NaiveDate>,
    pub leg1: Vec<f64>,
    pub leg2: Vec<f64>,
}

impl AlignedLegs {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// `leg2 - beta * leg1` on every aligned date.
    pub fn spread(&self, beta: f64) -> Vec<f64> {
        self.leg1
            .iter()
            .zip(&self.leg2)
            .map(|(x, y)| y - beta * x)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_universe() -> PriceUniverse {
        let dates = vec![d(2020, 1, 2), d(2020, 1, 3), d(2020, 2, 3), d(2020, 2, 4)];
        PriceUniverse::new(
            dates,
            vec![
                ("MSFT".into(), vec![Some(100.0), Some(105.0), Some(110.0), Some(120.0)]),
                ("NEW".into(), vec![None, Some(20.0), Some(10.0), Some(40.0)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_unsorted_dates() {
        let result = PriceUniverse::new(
            vec![d(2020, 1, 3), d(2020, 1, 2)],
            vec![("A".into(), vec![Some(1.0), Some(1.0)])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let result = PriceUniverse::new(
            vec![d(2020, 1, 2), d(2020, 1, 3)],
            vec![("A".into(), vec![Some(1.0)])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_duplicate_ticker() {
        let result = PriceUniverse::new(
            vec![d(2020, 1, 2)],
            vec![("A".into(), vec![Some(1.0)]), ("A".into(), vec![Some(2.0)])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_non_positive_prices_become_missing() {
        let u = PriceUniverse::new(
            vec![d(2020, 1, 2), d(2020, 1, 3), d(2020, 1, 6)],
            vec![("A".into(), vec![Some(0.0), Some(f64::NAN), Some(3.0)])],
        )
        .unwrap();
        assert_eq!(u.column("A").unwrap(), &[None, None, Some(3.0)]);
    }

    #[test]
    fn test_slice_normalizes_to_first_valid() {
        let u = sample_universe();
        let s = u.slice(d(2020, 1, 1), d(2020, 2, 28)).unwrap();
        assert_eq!(s.column("MSFT").unwrap()[0], Some(1.0));
        assert_eq!(s.column("MSFT").unwrap()[1], Some(1.05));
        let new = s.column("NEW").unwrap();
        assert_eq!(new[0], None);
        assert_eq!(new[1], Some(1.0));
        assert_eq!(new[2], Some(0.5));
        assert_eq!(new[3], Some(2.0));
    }

    #[test]
    fn test_slice_anchor_is_window_start() {
        let u = sample_universe();
        let s = u.slice(d(2020, 2, 1), d(2020, 2, 28)).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.column("MSFT").unwrap(), &[Some(1.0), Some(120.0 / 110.0)]);
    }

    #[test]
    fn test_slice_empty_window_errors() {
        let u = sample_universe();
        assert!(matches!(
            u.slice(d(2020, 3, 1), d(2020, 3, 31)),
            Err(StatArbError::EmptyWindow { .. })
        ));
        assert!(matches!(
            u.slice(d(2020, 2, 1), d(2020, 1, 1)),
            Err(StatArbError::EmptyWindow { .. })
        ));
    }

    #[test]
    fn test_sub_slice_keeps_parent_anchor() {
        let u = sample_universe();
        let s = u.slice(d(2020, 1, 1), d(2020, 2, 28)).unwrap();
        let tail = s.sub_slice(d(2020, 2, 1), d(2020, 2, 28)).unwrap();
        assert_eq!(tail.column("MSFT").unwrap()[0], Some(1.1));
    }

    #[test]
    fn test_aligned_drops_missing_rows() {
        let u = sample_universe();
        let s = u.slice(d(2020, 1, 1), d(2020, 2, 28)).unwrap();
        let legs = s.aligned("MSFT", "NEW").unwrap();
        assert_eq!(legs.len(), 3);
        assert_eq!(legs.dates[0], d(2020, 1, 3));
        assert!(s.aligned("MSFT", "NOPE").is_err());
    }

    #[test]
    fn test_deserialize_runs_validation() {
        let empty = r#"{"dates":[],"tickers":[],"columns":[]}"#;
        assert!(serde_json::from_str::<PriceUniverse>(empty).is_err());

        let unsorted = r#"{"dates":["2020-01-03","2020-01-02"],
                           "tickers":["A"],"columns":[[1.0,1.0]]}"#;
        assert!(serde_json::from_str::<PriceUniverse>(unsorted).is_err());

        let ragged = r#"{"dates":["2020-01-02"],"tickers":["A","B"],"columns":[[1.0]]}"#;
        assert!(serde_json::from_str::<PriceUniverse>(ragged).is_err());
    }

    #[test]
    fn test_deserialize_cleans_prices() {
        let json = r#"{"dates":["2020-01-02","2020-01-03"],
                       "tickers":["A"],"columns":[[-1.0,2.0]]}"#;
        let u: PriceUniverse = serde_json::from_str(json).unwrap();
        assert_eq!(u.column("A").unwrap(), &[None, Some(2.0)]);
        assert_eq!(u.last_date(), d(2020, 1, 3));

        let round_trip: PriceUniverse =
            serde_json::from_str(&serde_json::to_string(&u).unwrap()).unwrap();
        assert_eq!(round_trip.dates(), u.dates());
    }

    #[test]
    fn test_months_are_distinct_month_starts() {
        let u = sample_universe();
        assert_eq!(u.months(), vec![d(2020, 1, 1), d(2020, 2, 1)]);
    }
}
