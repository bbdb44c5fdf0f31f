use proptest::prelude::*;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::path::{parse_path, parse_pointer, to_path, to_pointer, PathSegment};
use crate::unifier::Unifier;

fn segment() -> impl Strategy<Value = PathSegment> {
    prop_oneof![
        any::<String>().prop_map(PathSegment::key),
        (0usize..1000).prop_map(PathSegment::index),
    ]
}

/// Pointer components that are all digits read back as indices, so
/// pointer round-trips only hold for non-numeric keys.
fn pointer_segment() -> impl Strategy<Value = PathSegment> {
    prop_oneof![
        "[a-z~/ ._]{0,6}"
            .prop_filter("numeric keys read back as indices", |k| {
                k.is_empty() || !k.chars().all(|c| c.is_ascii_digit())
            })
            .prop_map(PathSegment::key),
        (0usize..1000).prop_map(PathSegment::index),
    ]
}

fn rooted(segments: Vec<PathSegment>) -> Vec<PathSegment> {
    let mut path = vec![PathSegment::root()];
    path.extend(segments);
    path
}

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (0i64..4).prop_map(Value::from),
        "[ab]{0,2}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec(("(a|b|0|1)", inner), 0..4)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Order-independent view of the flattened schema.
fn summary(unifier: &Unifier) -> BTreeMap<String, (usize, Vec<(String, usize)>)> {
    unifier
        .flattened()
        .into_iter()
        .map(|node| {
            let mut values: Vec<(String, usize)> = node
                .observed_values
                .iter()
                .map(|(value, count)| (value.to_json().to_string(), *count))
                .collect();
            values.sort();
            (node.json_path(), (node.times_observed, values))
        })
        .collect()
}

proptest! {
    #[test]
    fn json_path_roundtrip(segments in prop::collection::vec(segment(), 0..6)) {
        let path = rooted(segments);
        prop_assert_eq!(parse_path(&to_path(&path)).unwrap(), path);
    }

    #[test]
    fn json_pointer_roundtrip(segments in prop::collection::vec(pointer_segment(), 0..6)) {
        let path = rooted(segments);
        prop_assert_eq!(parse_pointer(&to_pointer(&path)).unwrap(), path);
    }

    #[test]
    fn unification_is_order_independent(a in json_value(), b in json_value()) {
        let mut forward = Unifier::new();
        forward.process("a", &a);
        forward.process("b", &b);

        let mut backward = Unifier::new();
        backward.process("b", &b);
        backward.process("a", &a);

        prop_assert_eq!(summary(&forward), summary(&backward));
        prop_assert_eq!(forward.document_count(), 2);
    }
}
