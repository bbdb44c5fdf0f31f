use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashSet;

use super::design::{ApplyOutcome, InferenceRules, RecordDesign};
use super::record::PidRecord;
use super::value::Primitive;
use crate::errors::{ErrorKind, RuntimeError};

/// Error kinds that drop a single attribute value unless configured otherwise.
pub const DEFAULT_TOLERABLE_ERRORS: [ErrorKind; 2] =
    [ErrorKind::QueryNotFound, ErrorKind::QueryTypeMismatch];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub designs: usize,
    pub documents: usize,
    pub records: usize,
    /// (design, document) pairs excluded by a skip condition.
    pub skipped: usize,
    /// Attribute values lost to tolerable errors.
    pub dropped_values: usize,
    pub inferred_links: usize,
    /// Records overwritten by a later record with the same id.
    pub replaced: usize,
}

/// The completed record graph of one execution, in first-seen id order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordGraph {
    records: IndexMap<String, PidRecord>,
    stats: ExecutionStats,
}

impl RecordGraph {
    pub fn records(&self) -> impl Iterator<Item = &PidRecord> {
        self.records.values()
    }

    pub fn get(&self, id: &str) -> Option<&PidRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.records().map(PidRecord::to_simple_json).collect())
    }
}

/// Serializes as the bare `[{pid, record}]` array.
impl Serialize for RecordGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.values())
    }
}

/// Applies every design to every document, then infers backlinks.
pub struct Executor {
    designs: Vec<RecordDesign>,
    tolerable: HashSet<ErrorKind>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            designs: Vec::new(),
            tolerable: DEFAULT_TOLERABLE_ERRORS.into_iter().collect(),
        }
    }

    pub fn with_tolerable_errors(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.tolerable = kinds.into_iter().collect();
        self
    }

    pub fn add_design(&mut self, design: RecordDesign) -> &mut Self {
        self.designs.push(design);
        self
    }

    pub fn designs(&self) -> &[RecordDesign] {
        &self.designs
    }

    /// Runs the whole batch. Any fatal error aborts it; no partial graph
    /// is returned.
    pub fn execute(&self, documents: &[Value]) -> Result<RecordGraph, RuntimeError> {
        tracing::info!(
            designs = self.designs.len(),
            documents = documents.len(),
            "executing designs"
        );

        let mut stats = ExecutionStats {
            designs: self.designs.len(),
            documents: documents.len(),
            ..Default::default()
        };
        let mut records: IndexMap<String, PidRecord> = IndexMap::new();
        let mut rules = InferenceRules::new();

        for design in &self.designs {
            for (index, document) in documents.iter().enumerate() {
                match design.apply(document, index, &self.tolerable)? {
                    ApplyOutcome::Skipped => stats.skipped += 1,
                    ApplyOutcome::Recorded {
                        record,
                        rules: design_rules,
                        dropped,
                    } => {
                        stats.dropped_values += dropped;
                        rules.extend(design_rules);
                        let id = record.id().to_string();
                        if records.insert(id.clone(), record).is_some() {
                            stats.replaced += 1;
                            tracing::warn!(
                                design = design.name(),
                                record = %id,
                                "record replaced by a later record with the same id"
                            );
                        }
                    }
                }
            }
        }

        stats.inferred_links = infer_backlinks(&mut records, &rules);
        stats.records = records.len();
        tracing::info!(
            records = stats.records,
            skipped = stats.skipped,
            dropped = stats.dropped_values,
            inferred = stats.inferred_links,
            "execution finished"
        );
        Ok(RecordGraph { records, stats })
    }
}

/// For every record holding `(forward_link_type, receiver)` of some rule,
/// adds `(backward_link_type, sender)` to the receiver. Additions are
/// collected first, so they never trigger further rules.
fn infer_backlinks(records: &mut IndexMap<String, PidRecord>, rules: &InferenceRules) -> usize {
    let mut additions: Vec<(String, String, String)> = Vec::new();
    for sender in records.values() {
        for (condition, reaction) in rules {
            let target = Primitive::String(condition.receiver.clone());
            if sender.contains(&condition.forward_link_type, &target) {
                additions.push((
                    reaction.receiver.clone(),
                    reaction.backward_link_type.clone(),
                    sender.id().to_string(),
                ));
            }
        }
    }

    let mut added = 0;
    for (receiver, key, sender) in additions {
        match records.get_mut(&receiver) {
            Some(record) => {
                if record.add_tuple(key.as_str(), Primitive::String(sender.clone())) {
                    added += 1;
                    tracing::debug!(receiver = %receiver, key = %key, sender = %sender, "inferred backlink");
                }
            }
            None => {
                tracing::warn!(receiver = %receiver, "backlink receiver is not in the record graph");
            }
        }
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{EvalError, QueryError};
    use crate::runtime::design::constant;
    use serde_json::json;

    fn not_found() -> EvalError {
        EvalError::Query(QueryError::NotFound {
            query: "/nope".into(),
            segment: "nope".into(),
        })
    }

    #[test]
    fn test_single_design_single_document() {
        let mut executor = Executor::new();
        executor.add_design(
            RecordDesign::new("d")
                .set_id(constant(json!("X")))
                .add_value("type", constant(json!("doc"))),
        );
        let graph = executor.execute(&[json!({})]).unwrap();
        assert_eq!(
            graph.to_json(),
            json!([{"pid": "X", "record": [{"key": "type", "value": "doc"}]}])
        );
        assert_eq!(serde_json::to_value(&graph).unwrap(), graph.to_json());
        assert_eq!(graph.stats().records, 1);
    }

    #[test]
    fn test_designs_before_documents_order() {
        let mut executor = Executor::new();
        executor
            .add_design(RecordDesign::new("a").set_id(|ctx| Ok(json!(format!("a{}", ctx.document_index)))))
            .add_design(RecordDesign::new("b").set_id(|ctx| Ok(json!(format!("b{}", ctx.document_index)))));
        let graph = executor.execute(&[json!({}), json!({})]).unwrap();
        let ids: Vec<&str> = graph.records().map(PidRecord::id).collect();
        assert_eq!(ids, vec!["a0", "a1", "b0", "b1"]);
    }

    #[test]
    fn test_id_error_aborts_whole_batch() {
        let mut executor = Executor::new();
        executor
            .add_design(RecordDesign::new("ok").set_id(constant(json!("X"))))
            .add_design(RecordDesign::new("broken").set_id(|_| Err(not_found())));
        let err = executor.execute(&[json!({})]).unwrap_err();
        assert!(matches!(err, RuntimeError::Id { .. }));
    }

    #[test]
    fn test_tolerable_errors_drop_values() {
        let mut executor = Executor::new();
        executor.add_design(
            RecordDesign::new("d")
                .set_id(constant(json!("X")))
                .add_value("gone", |_| Err(not_found()))
                .add_value("kept", constant(json!(1))),
        );
        let graph = executor.execute(&[json!({})]).unwrap();
        assert_eq!(graph.get("X").unwrap().len(), 1);
        assert_eq!(graph.stats().dropped_values, 1);

        let mut strict = Executor::new().with_tolerable_errors([]);
        strict.add_design(
            RecordDesign::new("d")
                .set_id(constant(json!("X")))
                .add_value("gone", |_| Err(not_found())),
        );
        assert!(matches!(
            strict.execute(&[json!({})]),
            Err(RuntimeError::Attribute { .. })
        ));
    }

    #[test]
    fn test_skip_leaves_no_trace() {
        let mut executor = Executor::new();
        executor.add_design(
            RecordDesign::new("d")
                .set_id(|ctx| Ok(ctx.document["id"].clone()))
                .set_skip_condition(|ctx| Ok(ctx.document["draft"].clone()))
                .add_backlink("refs", "inverse-of-refs"),
        );
        let graph = executor
            .execute(&[json!({"id": "A", "draft": true}), json!({"id": "B"})])
            .unwrap();
        assert!(graph.get("A").is_none());
        assert!(graph.get("B").is_some());
        assert_eq!(graph.stats().skipped, 1);
    }

    #[test]
    fn test_backlink_inference() {
        let mut executor = Executor::new();
        executor
            .add_design(
                RecordDesign::new("sender")
                    .set_id(constant(json!("A")))
                    .add_value("refs", constant(json!("B"))),
            )
            .add_design(
                RecordDesign::new("receiver")
                    .set_id(constant(json!("B")))
                    .add_backlink("refs", "inverse-of-refs"),
            );
        let graph = executor.execute(&[json!({})]).unwrap();
        let receiver = graph.get("B").unwrap();
        assert!(receiver.contains("inverse-of-refs", &Primitive::from("A")));
        assert_eq!(graph.stats().inferred_links, 1);
        // the sender is unchanged
        assert_eq!(graph.get("A").unwrap().len(), 1);
    }

    #[test]
    fn test_later_record_replaces_earlier() {
        let mut executor = Executor::new();
        executor
            .add_design(
                RecordDesign::new("first")
                    .set_id(constant(json!("X")))
                    .add_value("v", constant(json!(1))),
            )
            .add_design(
                RecordDesign::new("second")
                    .set_id(constant(json!("X")))
                    .add_value("v", constant(json!(2))),
            );
        let graph = executor.execute(&[json!({})]).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.get("X").unwrap().contains("v", &Primitive::Number(serde_json::Number::from(2u8))));
        assert_eq!(graph.stats().replaced, 1);
    }
}
