use serde_json::Value;

use super::{format_cell, result_of};

/// Fields that carry the headline answer of each command, in priority order.
const PRIORITY_KEYS: [&str; 6] = [
    "total_return",
    "accepted",
    "params",
    "estimated",
    "log_likelihood",
    "windows",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let result = result_of(value);

    if let Value::Object(map) = result {
        for key in PRIORITY_KEYS {
            if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
                println!("{}", format_cell(val));
                return;
            }
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_cell(val));
            return;
        }
    }

    println!("{}", format_cell(result));
}
