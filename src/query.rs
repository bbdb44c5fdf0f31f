//! Query resolution against a JSON document.
//!
//! Pointer queries address exactly one location and fail when it does not
//! exist. JSONPath queries may contain wildcards and collect every match.

use serde_json::Value;

use crate::errors::QueryError;
use crate::path::{parse_pointer, tokenize_path, PathSegment, PathToken};

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Resolves an RFC 6901 JSON Pointer.
///
/// A numeric component against an object is looked up as a key, so
/// `{"0": x}` is reachable via `/0`.
pub fn resolve_pointer<'a>(pointer: &str, document: &'a Value) -> Result<&'a Value, QueryError> {
    let segments = parse_pointer(pointer)?;
    let mut current = document;
    for segment in segments.iter().skip(1) {
        current = step(pointer, current, segment)?;
    }
    Ok(current)
}

fn step<'a>(
    query: &str,
    current: &'a Value,
    segment: &PathSegment,
) -> Result<&'a Value, QueryError> {
    let not_found = || QueryError::NotFound {
        query: query.to_string(),
        segment: segment.value.clone(),
    };
    match current {
        Value::Object(map) => map.get(&segment.value).ok_or_else(not_found),
        Value::Array(items) => {
            if !segment.is_index() {
                return Err(QueryError::TypeMismatch {
                    query: query.to_string(),
                    segment: segment.value.clone(),
                    found: "array",
                });
            }
            segment
                .as_index()
                .and_then(|i| items.get(i))
                .ok_or_else(not_found)
        }
        other => Err(QueryError::TypeMismatch {
            query: query.to_string(),
            segment: segment.value.clone(),
            found: type_name(other),
        }),
    }
}

/// Collects every value matched by a JSONPath. Missing keys, out-of-range
/// indices and steps into scalars simply produce no match.
pub fn find_all(path: &str, document: &Value) -> Result<Vec<Value>, QueryError> {
    let tokens = tokenize_path(path)?;
    let mut matches: Vec<&Value> = vec![document];
    for token in &tokens {
        matches = matches
            .into_iter()
            .flat_map(|value| select(value, token))
            .collect();
        if matches.is_empty() {
            break;
        }
    }
    Ok(matches.into_iter().cloned().collect())
}

fn select<'a>(value: &'a Value, token: &PathToken) -> Vec<&'a Value> {
    match (token, value) {
        (PathToken::Key(key), Value::Object(map)) => map.get(key).into_iter().collect(),
        (PathToken::Index(index), Value::Array(items)) => index
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .into_iter()
            .collect(),
        (PathToken::Wildcard, Value::Object(map)) => map.values().collect(),
        (PathToken::Wildcard, Value::Array(items)) => items.iter().collect(),
        _ => Vec::new(),
    }
}
