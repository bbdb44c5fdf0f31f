use super::*;
use crate::runtime::{Executor, Primitive};
use serde_json::{json, Value};

fn pointer(id: &str, query: &str) -> Value {
    json!({"type": "input_json_pointer", "id": id, "fields": {"QUERY": query}})
}

fn text(id: &str, value: &str) -> Value {
    json!({"type": "text", "id": id, "fields": {"TEXT": value}})
}

fn attribute(id: &str, key: Value, value: Value) -> Value {
    json!({"type": "attribute_key", "id": id, "inputs": {"KEY": {"block": key}, "VALUE": {"block": value}}})
}

/// Chains statement blocks through their `next` links.
fn chain(mut blocks: Vec<Value>) -> Value {
    let mut current = blocks.pop().unwrap_or(Value::Null);
    while let Some(mut previous) = blocks.pop() {
        previous["next"] = json!({"block": current});
        current = previous;
    }
    current
}

fn record(id: &str, local_id: Value, body: Vec<Value>) -> Value {
    json!({
        "type": "pidrecord",
        "id": id,
        "inputs": {"local-id": {"block": local_id}, "record": {"block": chain(body)}}
    })
}

fn run(blocks: Vec<Value>, documents: &[Value]) -> Result<crate::runtime::RecordGraph, crate::errors::RuntimeError> {
    let graph = BlockGraph::from_json(&json!({"blocks": {"blocks": blocks}})).unwrap();
    let mut executor = Executor::new();
    for design in lower_graph(&graph).unwrap() {
        executor.add_design(design);
    }
    executor.execute(documents)
}

#[test]
fn test_pointer_id_and_text_attribute() {
    let graph = run(
        vec![record(
            "r",
            pointer("q", "/id"),
            vec![attribute("a", text("k", "type"), text("v", "doc"))],
        )],
        &[json!({"id": "X"})],
    )
    .unwrap();
    assert_eq!(
        graph.to_json(),
        json!([{"pid": "X", "record": [{"key": "type", "value": "doc"}]}])
    );
}

#[test]
fn test_missing_id_pointer_aborts() {
    let result = run(
        vec![record("r", pointer("q", "/id"), vec![])],
        &[json!({"id": "X"}), json!({"name": "no id"})],
    );
    assert!(matches!(result, Err(crate::errors::RuntimeError::Id { document: 1, .. })));
}

#[test]
fn test_missing_attribute_value_is_dropped() {
    let graph = run(
        vec![record(
            "r",
            pointer("q", "/id"),
            vec![
                attribute("a1", text("k1", "license"), pointer("p1", "/license")),
                attribute("a2", text("k2", "name"), pointer("p2", "/name")),
            ],
        )],
        &[json!({"id": "X", "name": "n"})],
    )
    .unwrap();
    let record = graph.get("X").unwrap();
    assert_eq!(record.len(), 1);
    assert!(record.contains("name", &Primitive::from("n")));
    assert_eq!(graph.stats().dropped_values, 1);
}

#[test]
fn test_json_path_values_expand() {
    let path = json!({
        "type": "input_custom_json_path",
        "id": "jp",
        "inputs": {"QUERY": {"block": text("t", "$.authors[*].name")}}
    });
    let graph = run(
        vec![record(
            "r",
            pointer("q", "/id"),
            vec![attribute("a", text("k", "author"), path)],
        )],
        &[json!({"id": "X", "authors": [{"name": "ada"}, {"name": "grace"}]})],
    )
    .unwrap();
    let authors: Vec<&Primitive> = graph.get("X").unwrap().values_of("author").collect();
    assert_eq!(authors, vec![&Primitive::from("ada"), &Primitive::from("grace")]);
}

#[test]
fn test_non_string_custom_query_is_fatal() {
    let custom = json!({
        "type": "input_custom_json_pointer",
        "id": "cp",
        "inputs": {"QUERY": {"block": {"type": "math_number", "id": "n", "fields": {"NUM": 3}}}}
    });
    let result = run(
        vec![record(
            "r",
            pointer("q", "/id"),
            vec![attribute("a", text("k", "x"), custom)],
        )],
        &[json!({"id": "X"})],
    );
    match result {
        Err(crate::errors::RuntimeError::Attribute { source, .. }) => {
            assert_eq!(source.kind(), crate::errors::ErrorKind::QuerySyntax)
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_otherwise_and_stop() {
    let fallback = json!({
        "type": "otherwise",
        "id": "o",
        "inputs": {
            "VALUE": {"block": pointer("p", "/title")},
            "OTHER": {"block": text("t", "untitled")}
        }
    });
    let graph = run(
        vec![record(
            "r",
            pointer("q", "/id"),
            vec![attribute("a", text("k", "title"), fallback)],
        )],
        &[json!({"id": "X", "title": "  "}), json!({"id": "Y", "title": "real"})],
    )
    .unwrap();
    assert!(graph.get("X").unwrap().contains("title", &Primitive::from("untitled")));
    assert!(graph.get("Y").unwrap().contains("title", &Primitive::from("real")));

    let stop = json!({"type": "stop_design", "id": "s", "inputs": {"MESSAGE": {"block": text("m", "no license")}}});
    let err = run(
        vec![record("r", pointer("q", "/id"), vec![attribute("a", text("k", "x"), stop)])],
        &[json!({"id": "X"})],
    )
    .unwrap_err();
    assert!(err.to_string().ends_with("Design stopped. no license"));
}

#[test]
fn test_otherwise_falls_back_when_the_field_is_missing() {
    let fallback = json!({
        "type": "otherwise",
        "id": "o",
        "inputs": {
            "VALUE": {"block": pointer("p", "/title")},
            "OTHER": {"block": text("t", "untitled")}
        }
    });
    let graph = run(
        vec![record(
            "r",
            pointer("q", "/id"),
            vec![attribute("a", text("k", "title"), fallback)],
        )],
        &[json!({"id": "X"})],
    )
    .unwrap();
    assert_eq!(
        graph.to_json(),
        json!([{"pid": "X", "record": [{"key": "title", "value": "untitled"}]}])
    );
    assert_eq!(graph.stats().dropped_values, 0);
}

#[test]
fn test_otherwise_keeps_stops_fatal() {
    let guarded = json!({
        "type": "otherwise",
        "id": "o",
        "inputs": {
            "VALUE": {"block": {"type": "stop_design", "id": "s"}},
            "OTHER": {"block": text("t", "fallback")}
        }
    });
    let err = run(
        vec![record("r", text("id", "X"), vec![attribute("a", text("k", "x"), guarded)])],
        &[json!({})],
    )
    .unwrap_err();
    assert!(err.to_string().ends_with("Design stopped. No error message provided"));
}

#[test]
fn test_backlinks_between_records() {
    let backlink = json!({
        "type": "backlink_declaration",
        "id": "b",
        "inputs": {"ATTRIBUTE_KEY": {"block": text("fk", "refs")}}
    });
    let graph = run(
        vec![
            record(
                "sender",
                text("sid", "A"),
                vec![attribute("a1", text("k1", "refs"), text("v1", "B"))],
            ),
            record(
                "receiver",
                text("rid", "B"),
                vec![attribute("a2", text("k2", "inverse-of-refs"), backlink)],
            ),
        ],
        &[json!({})],
    )
    .unwrap();
    let receiver = graph.get("B").unwrap();
    assert!(receiver.contains("inverse-of-refs", &Primitive::from("A")));
    assert_eq!(receiver.len(), 1);
}

#[test]
fn test_skip_condition() {
    let skippable = json!({
        "type": "pidrecord_skipable",
        "id": "r",
        "inputs": {
            "local-id": {"block": pointer("q", "/id")},
            "skip-condition": {"block": pointer("s", "/draft")},
            "record": {"block": attribute("a", text("k", "t"), text("v", "doc"))}
        }
    });
    let graph = run(
        vec![skippable],
        &[json!({"id": "A", "draft": true}), json!({"id": "B", "draft": false})],
    )
    .unwrap();
    assert!(graph.get("A").is_none());
    assert!(graph.get("B").is_some());
}

#[test]
fn test_profile_attributes() {
    let profile = json!({
        "type": "profile_hmc",
        "id": "p",
        "extraState": {"profile": {
            "identifier": "21.T/profile",
            "properties": [
                {"name": "kernelInformationProfile", "identifier": "21.T/kip"},
                {"name": "topic", "identifier": "21.T/topic"}
            ]
        }},
        "inputs": {
            "topic2": {"block": text("t", "physics")},
            "unknown": {"block": text("u", "ignored")}
        }
    });
    let graph = run(vec![record("r", text("id", "X"), vec![profile])], &[json!({})]).unwrap();
    let record = graph.get("X").unwrap();
    assert!(record.contains("21.T/kip", &Primitive::from("21.T/profile")));
    assert!(record.contains("21.T/topic", &Primitive::from("physics")));
    assert_eq!(record.len(), 2);
}

#[test]
fn test_list_and_log_values() {
    let list = json!({
        "type": "lists_create_with",
        "id": "l",
        "inputs": {
            "ADD0": {"block": text("a", "x")},
            "ADD1": {"block": {"type": "log_value", "id": "log", "fields": {"DESC": "second"}, "inputs": {"INVAR": {"block": text("b", "y")}}}}
        }
    });
    let graph = run(
        vec![record("r", text("id", "X"), vec![attribute("a", text("k", "tag"), list)])],
        &[json!({})],
    )
    .unwrap();
    let tags: Vec<&Primitive> = graph.get("X").unwrap().values_of("tag").collect();
    assert_eq!(tags, vec![&Primitive::from("x"), &Primitive::from("y")]);
}

#[test]
fn test_document_dependent_key_is_rejected() {
    let graph = BlockGraph::from_json(&json!([record(
        "r",
        text("id", "X"),
        vec![attribute("a", pointer("k", "/key"), text("v", "value"))],
    )]))
    .unwrap();
    let err = lower_graph(&graph).unwrap_err();
    assert!(matches!(err, GenerateError::NonStaticKey { ref block_id, .. } if block_id == "k"));
}

#[test]
fn test_empty_attribute_slots_are_dropped() {
    let graph = BlockGraph::from_json(&json!([record(
        "r",
        text("id", "X"),
        vec![
            attribute("a1", text("k1", ""), text("v1", "value")),
            json!({"type": "attribute_key", "id": "a2", "inputs": {"KEY": {"block": text("k2", "key")}}}),
        ],
    )]))
    .unwrap();
    let designs = lower_graph(&graph).unwrap();
    assert_eq!(designs.len(), 1);
    assert_eq!(designs[0].attribute_keys().count(), 0);
}

#[test]
fn test_incomplete_profile_is_structural() {
    let profile = json!({"type": "profile_hmc", "id": "p"});
    let graph = BlockGraph::from_json(&json!([record("r", text("id", "X"), vec![profile])])).unwrap();
    assert!(matches!(
        lower_graph(&graph),
        Err(GenerateError::IncompleteProfile { .. })
    ));
}

#[test]
fn test_nested_record_is_malformed() {
    let inner = record("inner", text("iid", "Y"), vec![]);
    let graph = BlockGraph::from_json(&json!([record("outer", text("id", "X"), vec![inner])])).unwrap();
    let err = lower_graph(&graph).unwrap_err();
    assert!(matches!(err, GenerateError::MalformedGraph(ref msg) if msg.contains("'inner'") && msg.contains("'outer'")));
}
