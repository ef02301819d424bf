//! Chat component helpers.

use serde_json::Value;

/// Wrap plain text into a JSON chat component.
pub fn component(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

/// Flatten a JSON chat component into plain text. Non-JSON input is returned as is.
pub fn plain_text(json: &str) -> String {
    match serde_json::from_str::<Value>(json) {
        Ok(value) => {
            let mut out = String::new();
            flatten(&value, &mut out);
            out
        }
        Err(_) => json.to_string(),
    }
}

fn flatten(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(parts) => parts.iter().for_each(|part| flatten(part, out)),
        Value::Object(map) => {
            if let Some(text) = map.get("text") {
                flatten(text, out);
            }
            if let Some(translate) = map.get("translate").and_then(Value::as_str) {
                out.push_str(translate);
            }
            if let Some(extra) = map.get("extra") {
                flatten(extra, out);
            }
        }
        _ => {}
    }
}
