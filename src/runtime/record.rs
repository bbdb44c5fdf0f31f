use indexmap::IndexSet;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::value::{to_primitives, Primitive};

/// One identifier record: an id, an optional explicit pid and a set of
/// unique `(key, value)` tuples in first-insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidRecord {
    id: String,
    pid: Option<String>,
    tuples: IndexSet<(String, Primitive)>,
}

impl PidRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pid: None,
            tuples: IndexSet::new(),
        }
    }

    /// An empty pid means "no pid"; the id is used instead.
    pub fn set_pid(&mut self, pid: impl Into<String>) -> &mut Self {
        let pid = pid.into();
        self.pid = if pid.is_empty() { None } else { Some(pid) };
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pid(&self) -> &str {
        self.pid.as_deref().unwrap_or(&self.id)
    }

    /// Adds one tuple. Returns false if it was already present.
    pub fn add_tuple(&mut self, key: impl Into<String>, value: Primitive) -> bool {
        self.tuples.insert((key.into(), value))
    }

    /// Adds every primitive `value` expands to and returns how many were new.
    pub fn add_value(&mut self, key: &str, value: &Value) -> usize {
        to_primitives(value)
            .into_iter()
            .filter(|primitive| self.add_tuple(key, primitive.clone()))
            .count()
    }

    pub fn contains(&self, key: &str, value: &Primitive) -> bool {
        self.tuples.contains(&(key.to_string(), value.clone()))
    }

    pub fn tuples(&self) -> impl Iterator<Item = (&str, &Primitive)> {
        self.tuples.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Values recorded under `key`, in insertion order.
    pub fn values_of<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Primitive> + 'a {
        self.tuples
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// The `{ pid, record: [{key, value}] }` form consumed downstream.
    pub fn to_simple_json(&self) -> Value {
        serde_json::json!({
            "pid": self.pid(),
            "record": self
                .tuples()
                .map(|(key, value)| serde_json::json!({"key": key, "value": value.to_json()}))
                .collect::<Vec<_>>(),
        })
    }
}

struct Entry<'a> {
    key: &'a str,
    value: &'a Primitive,
}

impl Serialize for Entry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Entry", 2)?;
        state.serialize_field("key", self.key)?;
        state.serialize_field("value", self.value)?;
        state.end()
    }
}

impl Serialize for PidRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry<'_>> = self
            .tuples()
            .map(|(key, value)| Entry { key, value })
            .collect();
        let mut state = serializer.serialize_struct("PidRecord", 2)?;
        state.serialize_field("pid", self.pid())?;
        state.serialize_field("record", &entries)?;
        state.end()
    }
}
