use serde_json::Value;
use std::io;

use statarb_core::backtest::SeriesTable;

use super::{format_cell, result_of, split_records};

/// Write output as CSV to stdout.
///
/// A result holding lists of records prints its first list as rows; anything
/// else prints as `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match result_of(value) {
        Value::Object(map) => {
            let (scalars, records) = split_records(map);
            if let Some((_, rows)) = records.first() {
                write_records(&mut wtr, rows);
            } else {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in scalars {
                    let _ = wtr.write_record([key, format_cell(val).as_str()]);
                }
            }
        }
        Value::Array(arr) => write_records(&mut wtr, arr),
        other => {
            let _ = wtr.write_record([format_cell(other)]);
        }
    }

    let _ = wtr.flush();
}

fn write_records<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        return;
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    let _ = wtr.write_record(&headers);
    for row in rows.iter().filter_map(Value::as_object) {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(format_cell).unwrap_or_default())
            .collect();
        let _ = wtr.write_record(&cells);
    }
}

/// Write a per-window table: a `date` column, then one `Portfolio_<start>`
/// column per window. Dates outside a window's trading period stay empty.
pub fn write_series_table<W: io::Write>(
    writer: W,
    table: &SeriesTable,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push("date".to_string());
    header.extend((0..table.columns.len()).map(|c| table.column_label(c)));
    wtr.write_record(&header)?;

    for (row, date) in table.index.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(date.to_string());
        record.extend(
            table
                .row(row)
                .into_iter()
                .map(|cell| cell.map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a per-window table to `path`.
pub fn write_series_file(
    path: &str,
    table: &SeriesTable,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::File::create(path)
        .map_err(|e| format!("Failed to create '{}': {}", path, e))?;
    write_series_table(file, table)?;
    tracing::info!(path, rows = table.index.len(), columns = table.columns.len(), "Wrote table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_series_table_csv_leaves_gaps_empty() {
        let d = |day| NaiveDate::from_ymd_opt(2001, 7, day).unwrap();
        let table = SeriesTable {
            index: vec![d(2), d(3)],
            columns: vec![d(1), d(2)],
            cells: vec![vec![Some(0.5), Some(0.0)], vec![None, Some(-1.25)]],
        };
        let mut buf = Vec::new();
        write_series_table(&mut buf, &table).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "date,Portfolio_2001-07-01,Portfolio_2001-07-02\n\
             2001-07-02,0.5,\n\
             2001-07-03,0,-1.25\n"
        );
    }
}
