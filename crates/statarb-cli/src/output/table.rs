use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{format_cell, result_of, split_records};

/// Format output as tables: the scalar fields of the result first, then one
/// table per list of records (pairs, windows, candidates).
pub fn print_table(value: &Value) {
    let result = result_of(value);
    match result {
        Value::Object(map) => {
            let (scalars, records) = split_records(map);
            if !scalars.is_empty() {
                let mut builder = Builder::default();
                builder.push_record(["Field", "Value"]);
                for (key, val) in scalars {
                    builder.push_record([key.to_string(), format_cell(val)]);
                }
                println!("{}", Table::from(builder));
            }
            for (name, rows) in records {
                println!("\n{}:", name);
                print_records(rows);
            }
        }
        Value::Array(arr) => print_records(arr),
        _ => println!("{}", format_cell(result)),
    }

    if let Some(envelope) = value.as_object() {
        if let Some(Value::Array(warnings)) = envelope.get("warnings") {
            if !warnings.is_empty() {
                println!("\nWarnings:");
                for w in warnings.iter().filter_map(Value::as_str) {
                    println!("  - {}", w);
                }
            }
        }
        if let Some(Value::String(meth)) = envelope.get("methodology") {
            println!("\nMethodology: {}", meth);
        }
    }
}

fn print_records(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        println!("(empty)");
        return;
    };
    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.clone());
    for row in rows.iter().filter_map(Value::as_object) {
        builder.push_record(
            headers
                .iter()
                .map(|h| row.get(h).map(format_cell).unwrap_or_default()),
        );
    }
    println!("{}", Table::from(builder));
}
