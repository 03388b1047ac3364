//! Bounding-box clamping for coordinates embedded in free text.
//!
//! Any `[a, b, c, d]` group of four signed integers is rewritten so every
//! member lies in `[COORD_MIN, COORD_MAX]`. Members are clamped independently;
//! nothing is assumed about which axis they describe.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::borrow::Cow;

pub const COORD_MIN: i64 = 0;
pub const COORD_MAX: i64 = 1000;

static COORD_GROUP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\s*-?[0-9]+\s*,\s*-?[0-9]+\s*,\s*-?[0-9]+\s*,\s*-?[0-9]+\s*)\]").unwrap()
});

pub fn clamp_int(n: i64) -> i64 {
    n.clamp(COORD_MIN, COORD_MAX)
}

fn clamp_token(raw: &str) -> i64 {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(n) => clamp_int(n),
        // Only overflow can fail here; saturate toward the sign.
        Err(_) if raw.starts_with('-') => COORD_MIN,
        Err(_) => COORD_MAX,
    }
}

/// Clamp every four-integer coordinate group in `text`, normalizing the
/// separators to `", "`. Text without a group is returned borrowed.
pub fn clamp_coordinates(text: &str) -> Cow<'_, str> {
    COORD_GROUP.replace_all(text, |caps: &Captures| {
        let members: Vec<String> = caps[1]
            .split(',')
            .map(|part| clamp_token(part).to_string())
            .collect();
        format!("[{}]", members.join(", "))
    })
}

/// Value-level wrapper: strings are clamped, everything else passes through.
pub fn clamp_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(clamp_coordinates(s).into_owned()),
        other => other.clone(),
    }
}
