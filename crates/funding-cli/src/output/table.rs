use serde_json::Value;
use tabled::{Table, builder::Builder};

use super::{flatten_row, union_headers};

/// Format output as tables using the tabled crate.
///
/// Scalar result fields go in a Field/Value table; each list of records
/// (assignments, facilities, screens) gets a table of its own.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_flat_object(map);
            }
        }
        Value::Array(arr) => {
            print_array_table(arr);
        }
        _ => {
            println!("{}", value);
        }
    }
}

fn print_result_table(result: &Value, envelope: &serde_json::Map<String, Value>) {
    if let Value::Object(res_map) = result {
        print_flat_object(res_map);

        for (key, val) in res_map {
            if let Value::Array(arr) = val {
                if arr.iter().any(Value::is_object) {
                    println!("\n{}:", key);
                    print_array_table(arr);
                }
            }
        }
    } else {
        print_flat_object(envelope);
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Field/Value rows for everything except record lists.
fn print_flat_object(map: &serde_json::Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        if matches!(val, Value::Array(arr) if arr.iter().any(Value::is_object)) {
            continue;
        }
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    let rows: Vec<Vec<(String, Value)>> = arr
        .iter()
        .filter_map(Value::as_object)
        .map(flatten_row)
        .collect();

    if rows.is_empty() {
        for item in arr {
            println!("{}", format_value(item));
        }
        return;
    }

    let headers = union_headers(&rows);
    let mut builder = Builder::default();
    builder.push_record(headers.iter().map(String::as_str));
    for row in &rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| {
                row.iter()
                    .find(|(k, _)| k == h)
                    .map(|(_, v)| format_value(v))
                    .unwrap_or_default()
            })
            .collect();
        builder.push_record(cells);
    }
    println!("{}", Table::from(builder));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
