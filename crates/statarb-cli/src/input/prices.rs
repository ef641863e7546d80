//! Price table CSV reader: a `date` column followed by one column per ticker.

use chrono::NaiveDate;
use std::io::Read;

use statarb_core::universe::PriceUniverse;

use super::file::resolve_path;

/// Load a price table from a CSV file.
pub fn read_prices(path: &str) -> Result<PriceUniverse, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let file = std::fs::File::open(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let universe = parse_prices(file)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?;
    tracing::info!(
        path = %canonical.display(),
        instruments = universe.tickers().len(),
        dates = universe.dates().len(),
        first = %universe.first_date(),
        last = %universe.last_date(),
        "Loaded price table"
    );
    Ok(universe)
}

pub fn parse_prices<R: Read>(reader: R) -> Result<PriceUniverse, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
        return Err("Price table needs a date column and at least one ticker column".into());
    }
    let tickers: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut dates = Vec::new();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); tickers.len()];
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let row = line + 2;
        let raw_date = record.get(0).unwrap_or_default();
        let date = parse_date(raw_date)
            .ok_or_else(|| format!("Row {}: unrecognised date '{}'", row, raw_date))?;
        dates.push(date);
        for (j, column) in columns.iter_mut().enumerate() {
            let cell = record.get(j + 1).unwrap_or_default();
            let price = parse_price(cell)
                .ok_or_else(|| format!("Row {}: bad price '{}' for {}", row, cell, tickers[j]))?;
            column.push(price);
        }
    }

    Ok(PriceUniverse::new(
        dates,
        tickers.into_iter().zip(columns).collect(),
    )?)
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.split(['T', ' ']).next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// `Some(None)` for a missing cell, `None` if the cell is not a number.
fn parse_price(cell: &str) -> Option<Option<f64>> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("na") {
        return Some(None);
    }
    cell.parse::<f64>().ok().map(Some)
}
