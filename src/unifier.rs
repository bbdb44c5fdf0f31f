//! Document Unifier
//!
//! Merges any number of JSON documents into one observed-schema tree. Every
//! node counts how often its path was seen and, for scalar occurrences, how
//! often each distinct value was seen. The tree backs the path picker of the
//! designer; nothing here feeds the code generator.
//!
//! ## Invariants
//!
//! 1. `root.times_observed` equals the number of processed documents.
//! 2. Object keys and array indices never share a child, even for `"0"` vs `0`.
//! 3. Scalars (including `null`) are counted at the node itself, never as children.
//! 4. Everything handed out is a deep copy.

use indexmap::IndexMap;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::VecDeque;

use crate::path::{to_path, to_pointer, PathSegment};
use crate::runtime::normalize_number;

// ═══════════════════════════════════════════════════════════════════════════════
// OBSERVED VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// A primitive JSON value usable as a frequency-table key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl ScalarValue {
    /// `None` for objects and arrays.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => Some(Self::Number(normalize_number(n))),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl Serialize for ScalarValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Serialize)]
struct ObservedValue<'a> {
    value: &'a ScalarValue,
    count: usize,
}

fn serialize_observed<S: Serializer>(
    values: &IndexMap<ScalarValue, usize>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(values.len()))?;
    for (value, count) in values {
        seq.serialize_element(&ObservedValue {
            value,
            count: *count,
        })?;
    }
    seq.end()
}

fn serialize_children<S: Serializer>(
    children: &IndexMap<PathSegment, SchemaNode>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(children.values())
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEMA TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// One path location across all processed documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    /// Last path component (`$` for the root).
    pub key: String,
    pub path: Vec<PathSegment>,
    /// Keyed by the child's terminal segment, so kind and value both count.
    /// Insertion order is display order.
    #[serde(serialize_with = "serialize_children")]
    pub children: IndexMap<PathSegment, SchemaNode>,
    #[serde(serialize_with = "serialize_observed")]
    pub observed_values: IndexMap<ScalarValue, usize>,
    pub times_observed: usize,
    #[serde(rename = "arrayElement")]
    pub is_array_element: bool,
}

impl SchemaNode {
    fn root() -> Self {
        Self::new(vec![PathSegment::root()], false)
    }

    fn new(path: Vec<PathSegment>, is_array_element: bool) -> Self {
        let key = path.last().map(|s| s.value.clone()).unwrap_or_default();
        Self {
            key,
            path,
            children: IndexMap::new(),
            observed_values: IndexMap::new(),
            times_observed: 0,
            is_array_element,
        }
    }

    pub fn is_branch(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_leaf_accumulator(&self) -> bool {
        !self.observed_values.is_empty()
    }

    pub fn pointer(&self) -> String {
        to_pointer(&self.path)
    }

    pub fn json_path(&self) -> String {
        to_path(&self.path)
    }

    /// Share of `total` occurrences in which this node was present.
    pub fn availability(&self, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.times_observed as f64 / total as f64
        }
    }

    /// Count of `value` at this node, 0 if never seen.
    pub fn count_of(&self, value: &Value) -> usize {
        ScalarValue::from_json(value)
            .and_then(|v| self.observed_values.get(&v).copied())
            .unwrap_or(0)
    }

    /// Looks up a descendant by a rooted segment list.
    pub fn find(&self, path: &[PathSegment]) -> Option<&SchemaNode> {
        let rest = match path.split_first() {
            Some((first, rest)) if first.is_root() => rest,
            _ => path,
        };
        rest.iter()
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    fn child_mut(&mut self, segment: PathSegment) -> &mut SchemaNode {
        let path = &self.path;
        self.children.entry(segment).or_insert_with_key(|segment| {
            let mut child_path = path.clone();
            child_path.push(segment.clone());
            SchemaNode::new(child_path, segment.is_index())
        })
    }

    fn merge(&mut self, content: &Value) {
        match content {
            Value::Object(map) => {
                for (key, value) in map {
                    let child = self.child_mut(PathSegment::key(key.as_str()));
                    child.times_observed += 1;
                    child.merge(value);
                }
            }
            Value::Array(items) => {
                for (index, value) in items.iter().enumerate() {
                    let child = self.child_mut(PathSegment::index(index));
                    child.times_observed += 1;
                    child.merge(value);
                }
            }
            scalar => {
                if let Some(value) = ScalarValue::from_json(scalar) {
                    *self.observed_values.entry(value).or_insert(0) += 1;
                }
            }
        }
    }
}

/// A flattened node as consumed by the path picker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlattenedEntry {
    pub key: String,
    pub path: Vec<PathSegment>,
    pub pointer: String,
    pub json_path: String,
    #[serde(serialize_with = "serialize_observed")]
    pub observed_values: IndexMap<ScalarValue, usize>,
    pub times_observed: usize,
    pub array_element: bool,
}

impl From<SchemaNode> for FlattenedEntry {
    fn from(node: SchemaNode) -> Self {
        Self {
            pointer: node.pointer(),
            json_path: node.json_path(),
            key: node.key,
            path: node.path,
            observed_values: node.observed_values,
            times_observed: node.times_observed,
            array_element: node.is_array_element,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// UNIFIER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Unifier {
    root: SchemaNode,
    documents: IndexMap<String, Value>,
}

impl Default for Unifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Unifier {
    pub fn new() -> Self {
        Self {
            root: SchemaNode::root(),
            documents: IndexMap::new(),
        }
    }

    /// Registers `document` under a disambiguated `name` and merges it into
    /// the tree. Returns the name actually assigned.
    pub fn process(&mut self, name: &str, document: &Value) -> String {
        let assigned = self.disambiguate(name);
        self.documents.insert(assigned.clone(), document.clone());
        self.root.times_observed += 1;
        self.root.merge(document);
        tracing::debug!(
            document = %assigned,
            documents = self.root.times_observed,
            "unified document"
        );
        assigned
    }

    fn disambiguate(&self, name: &str) -> String {
        if !self.documents.contains_key(name) {
            return name.to_string();
        }
        (1..)
            .map(|i| format!("{} ({})", name, i))
            .find(|candidate| !self.documents.contains_key(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    /// Discards the tree and the document registry.
    pub fn reset(&mut self) {
        self.root = SchemaNode::root();
        self.documents.clear();
    }

    pub fn document_count(&self) -> usize {
        self.root.times_observed
    }

    pub fn document_names(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    pub fn document(&self, name: &str) -> Option<Value> {
        self.documents.get(name).cloned()
    }

    pub fn unified_document(&self) -> SchemaNode {
        self.root.clone()
    }

    /// Breadth-first list of every node that holds scalar observations.
    pub fn flattened(&self) -> Vec<SchemaNode> {
        let mut flattened = Vec::new();
        let mut queue: VecDeque<&SchemaNode> = VecDeque::from([&self.root]);
        while let Some(current) = queue.pop_front() {
            if current.is_leaf_accumulator() {
                flattened.push(current.clone());
            }
            queue.extend(current.children.values());
        }
        flattened
    }

    pub fn flattened_entries(&self) -> Vec<FlattenedEntry> {
        self.flattened().into_iter().map(FlattenedEntry::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse_path;
    use serde_json::json;

    #[test]
    fn test_two_documents_merge() {
        let mut unifier = Unifier::new();
        unifier.process("one", &json!({"a": {"b": 1}}));
        unifier.process("two", &json!({"a": {"b": 2, "c": 3}}));

        let flat = unifier.flattened();
        assert_eq!(flat.len(), 2);

        let b = &flat[0];
        assert_eq!(b.json_path(), "$.a.b");
        assert_eq!(b.times_observed, 2);
        assert_eq!(b.count_of(&json!(1)), 1);
        assert_eq!(b.count_of(&json!(2)), 1);
        assert_eq!(b.observed_values.len(), 2);

        let c = &flat[1];
        assert_eq!(c.json_path(), "$.a.c");
        assert_eq!(c.times_observed, 1);
        assert_eq!(c.count_of(&json!(3)), 1);

        assert_eq!(unifier.unified_document().times_observed, 2);
    }

    #[test]
    fn test_key_and_index_do_not_collide() {
        let mut unifier = Unifier::new();
        unifier.process("obj", &json!({"list": {"0": "key"}}));
        unifier.process("arr", &json!({"list": ["index"]}));

        let tree = unifier.unified_document();
        let list = tree.find(&parse_path("$.list").unwrap()).unwrap();
        assert_eq!(list.children.len(), 2);
        let keyed = tree.find(&parse_path("$.list['0']").unwrap()).unwrap();
        assert!(!keyed.is_array_element);
        assert_eq!(keyed.count_of(&json!("key")), 1);
        let indexed = tree.find(&parse_path("$.list[0]").unwrap()).unwrap();
        assert!(indexed.is_array_element);
        assert_eq!(indexed.count_of(&json!("index")), 1);
    }

    #[test]
    fn test_null_and_mixed_nodes() {
        let mut unifier = Unifier::new();
        unifier.process("a", &json!({"x": null}));
        unifier.process("b", &json!({"x": {"y": true}}));
        unifier.process("c", &json!({"x": null}));

        let tree = unifier.unified_document();
        let x = tree.find(&parse_path("$.x").unwrap()).unwrap();
        assert!(x.is_branch());
        assert!(x.is_leaf_accumulator());
        assert_eq!(x.times_observed, 3);
        assert_eq!(x.count_of(&Value::Null), 2);
        assert!((x.availability(3) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_root_scalar_document() {
        let mut unifier = Unifier::new();
        unifier.process("s", &json!("plain"));
        let flat = unifier.flattened();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].key, "$");
        assert_eq!(flat[0].pointer(), "");
    }

    #[test]
    fn test_branch_only_nodes_are_omitted() {
        let mut unifier = Unifier::new();
        unifier.process("d", &json!({"a": [{"b": "x"}, {"b": "y"}]}));
        let paths: Vec<String> = unifier.flattened().iter().map(|n| n.json_path()).collect();
        assert_eq!(paths, vec!["$.a[0].b", "$.a[1].b"]);
    }

    #[test]
    fn test_name_disambiguation() {
        let mut unifier = Unifier::new();
        let doc = json!({});
        assert_eq!(unifier.process("file.json", &doc), "file.json");
        assert_eq!(unifier.process("file.json", &doc), "file.json (1)");
        assert_eq!(unifier.process("file.json", &doc), "file.json (2)");
        assert_eq!(
            unifier.document_names(),
            vec!["file.json", "file.json (1)", "file.json (2)"]
        );
        assert_eq!(unifier.document_count(), 3);
    }

    #[test]
    fn test_repeated_document_increments_counts() {
        let mut unifier = Unifier::new();
        let doc = json!({"k": "v"});
        unifier.process("d", &doc);
        unifier.process("d", &doc);
        let flat = unifier.flattened();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].times_observed, 2);
        assert_eq!(flat[0].count_of(&json!("v")), 2);
    }

    #[test]
    fn test_integral_floats_count_as_integers() {
        let mut unifier = Unifier::new();
        unifier.process("int", &json!({"n": 1}));
        unifier.process("float", &json!({"n": 1.0}));
        let flat = unifier.flattened();
        assert_eq!(flat[0].observed_values.len(), 1);
        assert_eq!(flat[0].count_of(&json!(1)), 2);
        assert_eq!(flat[0].count_of(&json!(1.0)), 2);
    }

    #[test]
    fn test_reset() {
        let mut unifier = Unifier::new();
        unifier.process("d", &json!({"k": 1}));
        unifier.reset();
        assert_eq!(unifier.document_count(), 0);
        assert!(unifier.flattened().is_empty());
        assert!(unifier.document_names().is_empty());
        assert_eq!(unifier.process("d", &json!({})), "d");
    }

    #[test]
    fn test_returned_trees_are_copies() {
        let mut unifier = Unifier::new();
        unifier.process("d", &json!({"k": 1}));
        let mut copy = unifier.unified_document();
        copy.times_observed = 99;
        copy.children.clear();
        let mut doc = unifier.document("d").unwrap();
        doc["k"] = json!(2);

        assert_eq!(unifier.unified_document().times_observed, 1);
        assert_eq!(unifier.flattened().len(), 1);
        assert_eq!(unifier.document("d").unwrap(), json!({"k": 1}));
    }

    #[test]
    fn test_flattened_entry_serialization() {
        let mut unifier = Unifier::new();
        unifier.process("d", &json!({"items": [1]}));
        let entries = serde_json::to_value(unifier.flattened_entries()).unwrap();
        assert_eq!(
            entries,
            json!([{
                "key": "0",
                "path": [
                    {"type": "key", "value": "$"},
                    {"type": "key", "value": "items"},
                    {"type": "index", "value": "0"}
                ],
                "pointer": "/items/0",
                "jsonPath": "$.items[0]",
                "observedValues": [{"value": 1, "count": 1}],
                "timesObserved": 1,
                "arrayElement": true
            }])
        );
    }
}
