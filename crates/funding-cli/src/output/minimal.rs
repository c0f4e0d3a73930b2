use serde_json::Value;

/// Print just the key answer value from the output.
///
/// A screen prints where the loan went; an allocation prints its headline
/// totals. Anything else falls back to the first field.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        if let Some(Value::Object(outcome)) = map.get("outcome") {
            println!("{}", describe_outcome(outcome));
            return;
        }

        let priority_keys = ["total_expected_yield", "loans_assigned", "loans_declined"];
        let found: Vec<String> = priority_keys
            .iter()
            .filter_map(|key| map.get(*key).map(|val| (key, val)))
            .filter(|(_, val)| !val.is_null())
            .map(|(key, val)| format!("{}={}", key, format_minimal(val)))
            .collect();
        if !found.is_empty() {
            println!("{}", found.join(" "));
            return;
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

/// The record's own `outcome` may itself be nested one level down.
fn describe_outcome(record: &serde_json::Map<String, Value>) -> String {
    let outcome = match record.get("outcome") {
        Some(Value::Object(inner)) => inner,
        _ => record,
    };
    match outcome.get("status").and_then(Value::as_str) {
        Some("assigned") => outcome
            .get("facility_id")
            .map(format_minimal)
            .unwrap_or_default(),
        Some("declined") => format!(
            "declined: {}",
            outcome.get("reason").map(format_minimal).unwrap_or_default()
        ),
        _ => serde_json::to_string(outcome).unwrap_or_default(),
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
