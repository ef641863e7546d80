pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("JSON serialization error: {}", e),
        },
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Render a scalar for a single table or CSV cell.
pub(crate) fn format_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) if arr.iter().all(|v| !v.is_object() && !v.is_array()) => {
            arr.iter().map(format_cell).collect::<Vec<_>>().join(", ")
        }
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// The `result` member of an output envelope, or the value itself.
pub(crate) fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// Split an object into scalar fields and named arrays of records.
pub(crate) fn split_records(
    map: &serde_json::Map<String, Value>,
) -> (Vec<(&str, &Value)>, Vec<(&str, &[Value])>) {
    let mut scalars = Vec::new();
    let mut records = Vec::new();
    for (key, val) in map {
        match val {
            Value::Array(arr) if arr.first().is_some_and(Value::is_object) => {
                records.push((key.as_str(), arr.as_slice()))
            }
            _ => scalars.push((key.as_str(), val)),
        }
    }
    (scalars, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_cell_flattens_scalar_arrays() {
        assert_eq!(format_cell(&json!([1, 2.5, "x"])), "1, 2.5, x");
        assert_eq!(format_cell(&Value::Null), "");
        assert_eq!(format_cell(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_split_records_separates_tables() {
        let v = json!({
            "accepted": 2,
            "pairs": [{"pair": "A_B"}, {"pair": "C_D"}],
            "empty": []
        });
        let (scalars, records) = split_records(v.as_object().unwrap());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "pairs");
        assert_eq!(records[0].1.len(), 2);
        assert_eq!(scalars.len(), 2);
    }

    #[test]
    fn test_result_of_unwraps_envelope() {
        let v = json!({"result": {"x": 1}, "warnings": []});
        assert_eq!(result_of(&v), &json!({"x": 1}));
        let bare = json!({"x": 1});
        assert_eq!(result_of(&bare), &bare);
    }
}
