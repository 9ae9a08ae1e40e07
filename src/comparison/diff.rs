//! Structural response diffing.
//!
//! Two responses match when their status codes are equal and their bodies
//! are equal: semantically when both decode as JSON, byte-for-byte
//! otherwise. Details summarize the first-level differences in a form a
//! human can act on.

use axum::body::Bytes;
use serde_json::Value;

/// Outcome of comparing the two sides of a dual dispatch.
#[derive(Debug, Clone)]
pub struct DiffReport {
    pub matched: bool,
    pub details: Vec<String>,
}

impl DiffReport {
    fn from_details(details: Vec<String>) -> Self {
        Self {
            matched: details.is_empty(),
            details,
        }
    }
}

/// Compare status and body of the old and new responses.
pub fn compare_responses(
    old_status: u16,
    old_body: &Bytes,
    new_status: u16,
    new_body: &Bytes,
) -> DiffReport {
    let mut details = Vec::new();

    if old_status != new_status {
        details.push(format!("status changed: {old_status} -> {new_status}"));
    }

    match (
        serde_json::from_slice::<Value>(old_body),
        serde_json::from_slice::<Value>(new_body),
    ) {
        (Ok(old_json), Ok(new_json)) => diff_values(&old_json, &new_json, &mut details),
        _ => diff_bytes(old_body, new_body, &mut details),
    }

    DiffReport::from_details(details)
}

/// First-level structural diff. Objects report changed/added/removed
/// fields; any other shapes are compared as whole values.
fn diff_values(old: &Value, new: &Value, details: &mut Vec<String>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_value) in old_map {
                match new_map.get(key) {
                    None => details.push(format!("field `{key}` removed")),
                    Some(new_value) if new_value != old_value => details.push(format!(
                        "field `{key}` changed: {} -> {}",
                        summarize(old_value),
                        summarize(new_value)
                    )),
                    Some(_) => {}
                }
            }
            for key in new_map.keys() {
                if !old_map.contains_key(key) {
                    details.push(format!("field `{key}` added"));
                }
            }
        }
        (old, new) if old != new => {
            details.push(format!(
                "body changed: {} -> {}",
                summarize(old),
                summarize(new)
            ));
        }
        _ => {}
    }
}

fn diff_bytes(old: &Bytes, new: &Bytes, details: &mut Vec<String>) {
    if old == new {
        return;
    }
    match old.iter().zip(new.iter()).position(|(a, b)| a != b) {
        Some(offset) => details.push(format!("bodies differ at byte {offset}")),
        None => details.push(format!(
            "body length changed: {} -> {} bytes",
            old.len(),
            new.len()
        )),
    }
}

/// Bounded rendering of a JSON value for diff details.
fn summarize(value: &Value) -> String {
    const MAX: usize = 80;
    let rendered = value.to_string();
    if rendered.chars().count() > MAX {
        let truncated: String = rendered.chars().take(MAX).collect();
        format!("{truncated}…")
    } else {
        rendered
    }
}
