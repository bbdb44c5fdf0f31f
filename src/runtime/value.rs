//! Value coercions shared by records, designs and conditionals.

use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

/// A scalar that can be stored as a record tuple value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Primitive {
    String(String),
    Number(Number),
    Bool(bool),
}

impl Primitive {
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Bool(b) => Value::Bool(*b),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Primitive {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl Serialize for Primitive {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(n) => n.serialize(serializer),
            Self::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Integral floats within the exactly representable range become integers,
/// so `1` and `1.0` compare and hash as the same number.
pub fn normalize_number(n: &Number) -> Number {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => {
            Number::from(f as i64)
        }
        _ => n.clone(),
    }
}

/// Expands an evaluator result into tuple values: `null` and `""` vanish,
/// arrays expand element-wise, objects become their compact JSON text.
pub fn to_primitives(value: &Value) -> Vec<Primitive> {
    let mut out = Vec::new();
    collect_primitives(value, &mut out);
    out
}

fn collect_primitives(value: &Value, out: &mut Vec<Primitive>) {
    match value {
        Value::Null => {}
        Value::String(s) if s.is_empty() => {}
        Value::String(s) => out.push(Primitive::String(s.clone())),
        Value::Number(n) => out.push(Primitive::Number(normalize_number(n))),
        Value::Bool(b) => out.push(Primitive::Bool(*b)),
        Value::Array(items) => {
            for item in items {
                collect_primitives(item, out);
            }
        }
        Value::Object(_) => out.push(Primitive::String(value.to_string())),
    }
}

/// Skip-condition truthiness.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Textual form of an id or pid. `None` for values without one.
pub fn coerce_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(normalize_number(n).to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_primitives() {
        assert!(to_primitives(&json!(null)).is_empty());
        assert!(to_primitives(&json!("")).is_empty());
        assert_eq!(
            to_primitives(&json!(["a", ["b", null], 3, true, ""])),
            vec![
                Primitive::from("a"),
                Primitive::from("b"),
                Primitive::Number(3.into()),
                Primitive::Bool(true),
            ]
        );
        assert_eq!(
            to_primitives(&json!({"k": [1, 2]})),
            vec![Primitive::from("{\"k\":[1,2]}")]
        );
    }

    #[test]
    fn test_integral_floats_match_integers() {
        assert_eq!(normalize_number(&Number::from_f64(1.0).unwrap()), Number::from(1));
        assert_eq!(normalize_number(&Number::from_f64(-0.0).unwrap()), Number::from(0));
        assert_eq!(normalize_number(&Number::from_f64(1.5).unwrap()), Number::from_f64(1.5).unwrap());
        assert!(normalize_number(&Number::from_f64(1e300).unwrap()).is_f64());
        assert_eq!(to_primitives(&json!([1, 1.0])), vec![Primitive::Number(1.into()); 2]);
    }

    #[test]
    fn test_is_truthy() {
        for falsy in [json!(false), json!(null), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&falsy), "{} should be falsy", falsy);
        }
        for truthy in [json!(true), json!(1), json!("no"), json!([0]), json!({"a": null})] {
            assert!(is_truthy(&truthy), "{} should be truthy", truthy);
        }
    }

    #[test]
    fn test_coerce_identifier() {
        assert_eq!(coerce_identifier(&json!("X")), Some("X".into()));
        assert_eq!(coerce_identifier(&json!(42)), Some("42".into()));
        assert_eq!(coerce_identifier(&json!(false)), Some("false".into()));
        assert_eq!(coerce_identifier(&json!(7.0)), Some("7".into()));
        assert_eq!(coerce_identifier(&json!(null)), None);
        assert_eq!(coerce_identifier(&json!(["X"])), None);
    }
}
