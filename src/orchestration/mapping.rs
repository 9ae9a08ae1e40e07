//! Step input resolution against the execution context.
//!
//! The context accumulates the inbound request body (under the reserved
//! source name "request") and every completed step's output under the step
//! name. Mappings and conditions address values with dot-separated field
//! paths, e.g. `source_step = "reserve", source_field = "payment.id"`.

use axum::body::Bytes;
use serde_json::{Map, Value};

use crate::store::model::{InputMapping, StepCondition};

/// Reserved source name for the inbound request body.
pub const REQUEST_SOURCE: &str = "request";

/// Accumulating view of prior outputs available to later steps.
#[derive(Debug)]
pub struct ExecutionContext {
    values: Map<String, Value>,
}

impl ExecutionContext {
    /// Seed the context with the inbound body. Non-JSON bodies are exposed
    /// as a string so conditions can still reference them.
    pub fn from_request(body: &Bytes) -> Self {
        let mut values = Map::new();
        values.insert(REQUEST_SOURCE.to_string(), parse_body(body));
        Self { values }
    }

    pub fn record_output(&mut self, step_name: &str, output: Value) {
        self.values.insert(step_name.to_string(), output);
    }

    /// Look up `field_path` inside the named source.
    pub fn lookup(&self, source_step: &str, field_path: &str) -> Option<&Value> {
        let mut current = self.values.get(source_step)?;
        for segment in field_path.split('.') {
            current = current.get(segment)?;
        }
        Some(current)
    }

    /// Whether a step's gate is satisfied. A condition referencing a value
    /// that is absent from the context does not hold.
    pub fn condition_holds(&self, condition: &StepCondition) -> bool {
        self.lookup(&condition.source_step, &condition.field)
            .map(|v| *v == condition.equals)
            .unwrap_or(false)
    }
}

/// Build a step's input body from its mapping table. Every mapping must
/// resolve; a dangling reference is a plan error, not a silent null.
pub fn resolve_step_input(
    mappings: &[InputMapping],
    ctx: &ExecutionContext,
) -> Result<Value, String> {
    let mut input = Value::Object(Map::new());
    for mapping in mappings {
        let value = ctx
            .lookup(&mapping.source_step, &mapping.source_field)
            .ok_or_else(|| {
                format!(
                    "no value at {}.{}",
                    mapping.source_step, mapping.source_field
                )
            })?
            .clone();
        set_path(&mut input, &mapping.target_field, value);
    }
    Ok(input)
}

/// Decode a response body: JSON when it parses, lossy string otherwise,
/// null when empty.
pub fn parse_body(body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn set_path(target: &mut Value, path: &str, value: Value) {
    let mut current = target;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let map = current
            .as_object_mut()
            .unwrap_or_else(|| unreachable!("just coerced to object"));
        if i == segments.len() - 1 {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}
