//! Control helpers available to designs: fallbacks, explicit stops and
//! pass-through logging.

use serde_json::Value;

use crate::errors::EvalError;

const EMPTYISH_STRINGS: [&str; 5] = ["", "null", "()", "[]", "{}"];
const DEFAULT_STOP_MESSAGE: &str = "No error message provided";

/// True for values that carry no usable information.
pub fn is_emptyish(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => EMPTYISH_STRINGS.contains(&s.trim().to_lowercase().as_str()),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Returns `value` unless it is empty-ish or failed, in which case `other`
/// is evaluated. An explicit stop is never swallowed.
pub fn otherwise<F>(value: Result<Value, EvalError>, other: F) -> Result<Value, EvalError>
where
    F: FnOnce() -> Result<Value, EvalError>,
{
    match value {
        Ok(value) if !is_emptyish(&value) => Ok(value),
        Ok(_) => other(),
        Err(err @ EvalError::Stopped(_)) => Err(err),
        Err(err) => {
            tracing::debug!(error = %err, "first value failed, using fallback");
            other()
        }
    }
}

/// The error a `stop_design` block raises.
pub fn stop_with_fail(message: Option<&str>) -> EvalError {
    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_STOP_MESSAGE);
    EvalError::Stopped(message.to_string())
}

/// Logs `value` with its description and hands it back unchanged.
pub fn log_value(value: Value, description: &str) -> Value {
    tracing::info!(description = %description, value = %value, "log block");
    value
}
