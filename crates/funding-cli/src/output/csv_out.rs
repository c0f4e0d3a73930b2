use serde_json::Value;
use std::io;

use super::{flatten_row, union_headers};

/// Write output as CSV to stdout.
///
/// The envelope's primary record list (`assignments` for an allocation,
/// `screens` for a screen) becomes the rows; other results fall back to a
/// two-column field/value listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Object(map) => {
            let rows = ["assignments", "screens"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array));
            match rows {
                Some(arr) => write_array_csv(&mut wtr, arr),
                None => {
                    let _ = wtr.write_record(["field", "value"]);
                    for (key, val) in map {
                        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                    }
                }
            }
        }
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&format_csv_value(result)]);
        }
    }

    let _ = wtr.flush();
}

fn write_array_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    let rows: Vec<Vec<(String, Value)>> = arr
        .iter()
        .filter_map(Value::as_object)
        .map(flatten_row)
        .collect();

    if rows.is_empty() {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
        return;
    }

    let headers = union_headers(&rows);
    let _ = wtr.write_record(&headers);
    for row in &rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| {
                row.iter()
                    .find(|(k, _)| k == h)
                    .map(|(_, v)| format_csv_value(v))
                    .unwrap_or_default()
            })
            .collect();
        let _ = wtr.write_record(&record);
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) => arr.iter().map(format_csv_value).collect::<Vec<_>>().join("; "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
