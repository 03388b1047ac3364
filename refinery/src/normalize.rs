//! Rewrites legacy message lists into typed content blocks.
//!
//! Three content shapes are accepted per message:
//! - a list whose first element is an object: kept as-is, blocks unchecked
//! - a bare string: wrapped as one text block
//! - a list whose first element is a string: elements concatenated into one
//!   text block, provided every element is a string
//!
//! Anything else becomes an empty list, which structural validation rejects
//! later. `normalize_record` never mutates its input and is idempotent.

use serde_json::{json, Map, Value};

pub fn normalize_record(record: &Value) -> Value {
    let messages: Vec<Value> = record
        .get("messages")
        .and_then(Value::as_array)
        .map(|messages| messages.iter().map(normalize_message).collect())
        .unwrap_or_default();

    json!({ "messages": messages })
}

pub fn normalize_message(message: &Value) -> Value {
    let mut out = Map::new();
    if let Some(role) = message.get("role") {
        out.insert("role".to_string(), role.clone());
    }
    let content = message.get("content").map(normalize_content).unwrap_or_default();
    out.insert("content".to_string(), Value::Array(content));
    Value::Object(out)
}

pub fn normalize_content(content: &Value) -> Vec<Value> {
    match content {
        Value::Array(items) => match items.first() {
            Some(Value::Object(_)) => items.clone(),
            Some(Value::String(_)) => {
                // Every element must be a string, otherwise the message is unusable.
                let joined: Option<String> = items.iter().map(Value::as_str).collect();
                joined.map(|text| vec![text_block(text)]).unwrap_or_default()
            }
            _ => Vec::new(),
        },
        Value::String(s) => vec![text_block(s.clone())],
        _ => Vec::new(),
    }
}

fn text_block(text: String) -> Value {
    json!({ "type": "text", "text": text })
}
