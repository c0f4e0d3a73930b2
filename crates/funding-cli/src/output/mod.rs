pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod report;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Flatten an object one level deep: nested objects become `parent.child`
/// columns so tagged outcomes fit in a row.
pub(crate) fn flatten_row(map: &serde_json::Map<String, Value>) -> Vec<(String, Value)> {
    let mut row = Vec::with_capacity(map.len());
    for (key, val) in map {
        match val {
            Value::Object(inner) => {
                for (k, v) in inner {
                    row.push((format!("{key}.{k}"), v.clone()));
                }
            }
            other => row.push((key.clone(), other.clone())),
        }
    }
    row
}

/// Column headers over a set of rows, in first-seen order. Assigned and
/// declined records carry different fields.
pub(crate) fn union_headers(rows: &[Vec<(String, Value)>]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for (key, _) in row {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    headers
}
