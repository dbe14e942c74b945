// Warden — Audit field redaction
//
// Any key whose name contains a sensitive fragment has its value masked
// before the entry is persisted. Nested objects are walked so a secret
// cannot hide one level down.

use serde_json::{Map, Value};

const SENSITIVE_KEY_FRAGMENTS: [&str; 5] = ["password", "token", "key", "secret", "credential"];

/// Characters of a masked string that remain visible.
const VISIBLE_SUFFIX: usize = 4;

const MASK: &str = "****";
const FULL_MASK: &str = "[REDACTED]";

pub fn is_sensitive_key(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SENSITIVE_KEY_FRAGMENTS.iter().any(|f| lower.contains(f))
}

/// Mask a value, keeping the last four characters of strings longer than
/// four characters. Everything else is fully masked.
pub fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            let len = s.chars().count();
            if len > VISIBLE_SUFFIX {
                let suffix: String = s.chars().skip(len - VISIBLE_SUFFIX).collect();
                Value::String(format!("{}{}", MASK, suffix))
            } else {
                Value::String(FULL_MASK.to_string())
            }
        }
        _ => Value::String(FULL_MASK.to_string()),
    }
}

pub fn redact(data: Map<String, Value>) -> Map<String, Value> {
    data.into_iter()
        .map(|(key, value)| {
            let value = if is_sensitive_key(&key) {
                mask_value(&value)
            } else {
                redact_nested(value)
            };
            (key, value)
        })
        .collect()
}

fn redact_nested(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_nested).collect()),
        other => other,
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
