use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use super::record::PidRecord;
use super::value::{coerce_identifier, is_truthy};
use crate::errors::{ErrorKind, EvalError, RuntimeError};

// ═══════════════════════════════════════════════════════════════════════════════
// EVALUATION CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything an evaluator may read. Passed explicitly into every call.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub document: &'a Value,
    pub document_index: usize,
    pub design: &'a str,
}

/// A lazily evaluated expression of a design.
pub type Evaluator = Box<dyn Fn(&EvalContext<'_>) -> Result<Value, EvalError>>;

/// Sentinel an attribute may carry instead of a value: "when another record
/// links to this one via `forward_link_type`, link back under my key".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackwardLinkFor {
    pub forward_link_type: String,
}

impl BackwardLinkFor {
    pub fn new(forward_link_type: impl Into<String>) -> Self {
        Self {
            forward_link_type: forward_link_type.into(),
        }
    }
}

pub enum AttributeSource {
    Value(Evaluator),
    Backlink(BackwardLinkFor),
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFERENCE RULES
// ═══════════════════════════════════════════════════════════════════════════════

/// Matches a record holding the tuple `(forward_link_type, receiver)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    pub forward_link_type: String,
    pub receiver: String,
}

/// Adds `(backward_link_type, <sender id>)` to the receiver record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub receiver: String,
    pub backward_link_type: String,
}

pub type InferenceRules = IndexMap<Condition, Reaction>;

// ═══════════════════════════════════════════════════════════════════════════════
// RECORD DESIGN
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of applying one design to one document.
#[derive(Debug)]
pub enum ApplyOutcome {
    Skipped,
    Recorded {
        record: PidRecord,
        rules: InferenceRules,
        /// Values lost to tolerable evaluation errors.
        dropped: usize,
    },
}

/// Declarative description of how to build one record from one document.
/// Stateless until `apply` is called.
pub struct RecordDesign {
    name: String,
    id: Option<Evaluator>,
    pid: Option<Evaluator>,
    skip_condition: Option<Evaluator>,
    attributes: IndexMap<String, Vec<Evaluator>>,
    /// `(forward_link_type, backward_link_type)` pairs.
    backlinks: IndexSet<(String, String)>,
}

impl fmt::Debug for RecordDesign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordDesign")
            .field("name", &self.name)
            .field("has_id", &self.id.is_some())
            .field("has_pid", &self.pid.is_some())
            .field("has_skip_condition", &self.skip_condition.is_some())
            .field(
                "attributes",
                &self
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.len()))
                    .collect::<Vec<_>>(),
            )
            .field("backlinks", &self.backlinks)
            .finish()
    }
}

impl RecordDesign {
    /// `name` only labels log lines and errors.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            pid: None,
            skip_condition: None,
            attributes: IndexMap::new(),
            backlinks: IndexSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_id<F>(mut self, id: F) -> Self
    where
        F: Fn(&EvalContext<'_>) -> Result<Value, EvalError> + 'static,
    {
        self.id = Some(Box::new(id));
        self
    }

    pub fn set_pid<F>(mut self, pid: F) -> Self
    where
        F: Fn(&EvalContext<'_>) -> Result<Value, EvalError> + 'static,
    {
        self.pid = Some(Box::new(pid));
        self
    }

    pub fn set_skip_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&EvalContext<'_>) -> Result<Value, EvalError> + 'static,
    {
        self.skip_condition = Some(Box::new(condition));
        self
    }

    /// Registers a value evaluator or a backlink for `key`. Repeated keys
    /// keep every evaluator in registration order.
    pub fn add_attribute(mut self, key: impl Into<String>, source: AttributeSource) -> Self {
        let key = key.into();
        match source {
            AttributeSource::Value(evaluator) => {
                self.attributes.entry(key).or_default().push(evaluator);
            }
            AttributeSource::Backlink(link) => {
                self.backlinks.insert((link.forward_link_type, key));
            }
        }
        self
    }

    pub fn add_value<F>(self, key: impl Into<String>, value: F) -> Self
    where
        F: Fn(&EvalContext<'_>) -> Result<Value, EvalError> + 'static,
    {
        self.add_attribute(key, AttributeSource::Value(Box::new(value)))
    }

    pub fn add_backlink(
        self,
        forward_link_type: impl Into<String>,
        backward_link_type: impl Into<String>,
    ) -> Self {
        self.add_attribute(
            backward_link_type,
            AttributeSource::Backlink(BackwardLinkFor::new(forward_link_type)),
        )
    }

    pub fn attribute_keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn backlinks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.backlinks.iter().map(|(f, b)| (f.as_str(), b.as_str()))
    }

    fn compute_id(&self, context: &EvalContext<'_>) -> Result<String, RuntimeError> {
        let evaluator = self.id.as_ref().ok_or_else(|| RuntimeError::MissingId {
            design: self.name.clone(),
        })?;
        let value = evaluator(context).map_err(|source| RuntimeError::Id {
            design: self.name.clone(),
            document: context.document_index,
            source,
        })?;
        let invalid = |reason: String| RuntimeError::InvalidId {
            design: self.name.clone(),
            document: context.document_index,
            reason,
        };
        let id = coerce_identifier(&value)
            .ok_or_else(|| invalid(format!("expected a string, got {}", value)))?;
        if id.is_empty() {
            return Err(invalid("the id is empty".to_string()));
        }
        Ok(id)
    }

    fn compute_pid(&self, context: &EvalContext<'_>) -> Result<Option<String>, RuntimeError> {
        let Some(evaluator) = &self.pid else {
            return Ok(None);
        };
        let value = evaluator(context).map_err(|source| RuntimeError::Pid {
            design: self.name.clone(),
            document: context.document_index,
            source,
        })?;
        Ok(coerce_identifier(&value).filter(|pid| !pid.is_empty()))
    }

    fn should_skip(&self, context: &EvalContext<'_>) -> Result<bool, RuntimeError> {
        let Some(condition) = &self.skip_condition else {
            return Ok(false);
        };
        condition(context)
            .map(|value| is_truthy(&value))
            .map_err(|source| RuntimeError::SkipCondition {
                design: self.name.clone(),
                document: context.document_index,
                source,
            })
    }

    /// Applies the design to one document.
    ///
    /// Errors of a kind in `tolerable` drop the single value; every other
    /// error aborts with the originating attribute.
    pub fn apply(
        &self,
        document: &Value,
        document_index: usize,
        tolerable: &HashSet<ErrorKind>,
    ) -> Result<ApplyOutcome, RuntimeError> {
        let context = EvalContext {
            document,
            document_index,
            design: &self.name,
        };

        if self.should_skip(&context)? {
            tracing::info!(design = %self.name, document = document_index, "skip condition met");
            return Ok(ApplyOutcome::Skipped);
        }

        let id = self.compute_id(&context)?;
        let mut record = PidRecord::new(id.clone());
        if let Some(pid) = self.compute_pid(&context)? {
            record.set_pid(pid);
        }

        let mut dropped = 0;
        for (key, evaluators) in &self.attributes {
            tracing::debug!(
                design = %self.name,
                attribute = %key,
                candidates = evaluators.len(),
                "evaluating attribute"
            );
            for evaluator in evaluators {
                match evaluator(&context) {
                    Ok(value) => {
                        record.add_value(key, &value);
                    }
                    Err(e) if tolerable.contains(&e.kind()) => {
                        dropped += 1;
                        tracing::warn!(
                            design = %self.name,
                            record = %id,
                            attribute = %key,
                            kind = e.kind().as_str(),
                            "skipping attribute value: {}",
                            e
                        );
                    }
                    Err(source) => {
                        tracing::error!(
                            design = %self.name,
                            record = %id,
                            attribute = %key,
                            "cannot retrieve attribute value: {}",
                            source
                        );
                        return Err(RuntimeError::Attribute {
                            design: self.name.clone(),
                            key: key.clone(),
                            document: document_index,
                            source,
                        });
                    }
                }
            }
        }

        let mut rules = InferenceRules::new();
        for (forward_link_type, backward_link_type) in &self.backlinks {
            rules.insert(
                Condition {
                    forward_link_type: forward_link_type.clone(),
                    receiver: id.clone(),
                },
                Reaction {
                    receiver: id.clone(),
                    backward_link_type: backward_link_type.clone(),
                },
            );
        }

        Ok(ApplyOutcome::Recorded {
            record,
            rules,
            dropped,
        })
    }
}

/// Evaluator returning a constant.
pub fn constant(value: Value) -> impl Fn(&EvalContext<'_>) -> Result<Value, EvalError> {
    move |_| Ok(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QueryError;
    use serde_json::json;

    fn tolerable() -> HashSet<ErrorKind> {
        [ErrorKind::QueryNotFound, ErrorKind::QueryTypeMismatch]
            .into_iter()
            .collect()
    }

    fn recorded(outcome: ApplyOutcome) -> (PidRecord, InferenceRules, usize) {
        match outcome {
            ApplyOutcome::Recorded {
                record,
                rules,
                dropped,
            } => (record, rules, dropped),
            ApplyOutcome::Skipped => panic!("expected a record"),
        }
    }

    #[test]
    fn test_apply_builds_record() {
        let design = RecordDesign::new("d")
            .set_id(constant(json!("X")))
            .add_value("type", constant(json!("doc")));
        let (record, rules, dropped) =
            recorded(design.apply(&json!({}), 0, &tolerable()).unwrap());
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"pid": "X", "record": [{"key": "type", "value": "doc"}]})
        );
        assert!(rules.is_empty());
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_evaluators_read_the_context() {
        let design = RecordDesign::new("d")
            .set_id(|ctx| Ok(ctx.document["id"].clone()))
            .set_pid(|ctx| Ok(json!(format!("{}-{}", ctx.design, ctx.document_index))))
            .add_value("size", |ctx| Ok(ctx.document["size"].clone()));
        let (record, _, _) =
            recorded(design.apply(&json!({"id": 7, "size": 3}), 4, &tolerable()).unwrap());
        assert_eq!(record.id(), "7");
        assert_eq!(record.pid(), "d-4");
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_missing_and_invalid_ids_are_fatal() {
        let design = RecordDesign::new("no-id");
        assert!(matches!(
            design.apply(&json!({}), 0, &tolerable()),
            Err(RuntimeError::MissingId { .. })
        ));

        let design = RecordDesign::new("empty").set_id(constant(json!("")));
        assert!(matches!(
            design.apply(&json!({}), 0, &tolerable()),
            Err(RuntimeError::InvalidId { .. })
        ));

        let design = RecordDesign::new("object").set_id(constant(json!({"a": 1})));
        assert!(matches!(
            design.apply(&json!({}), 0, &tolerable()),
            Err(RuntimeError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_id_errors_are_fatal_even_if_tolerable() {
        let design = RecordDesign::new("d").set_id(|_| {
            Err(EvalError::Query(QueryError::NotFound {
                query: "/id".into(),
                segment: "id".into(),
            }))
        });
        let err = design.apply(&json!({}), 2, &tolerable()).unwrap_err();
        assert!(matches!(err, RuntimeError::Id { document: 2, .. }));
    }

    #[test]
    fn test_tolerable_and_fatal_attribute_errors() {
        let design = RecordDesign::new("d")
            .set_id(constant(json!("X")))
            .add_value("missing", |_| {
                Err(EvalError::Query(QueryError::NotFound {
                    query: "/nope".into(),
                    segment: "nope".into(),
                }))
            })
            .add_value("type", constant(json!("doc")));
        let (record, _, dropped) = recorded(design.apply(&json!({}), 0, &tolerable()).unwrap());
        assert_eq!(dropped, 1);
        assert_eq!(record.len(), 1);

        let err = design.apply(&json!({}), 0, &HashSet::new()).unwrap_err();
        match err {
            RuntimeError::Attribute { key, .. } => assert_eq!(key, "missing"),
            other => panic!("unexpected error {:?}", other),
        }

        let stopping = RecordDesign::new("d")
            .set_id(constant(json!("X")))
            .add_value("x", |_| Err(EvalError::Stopped("bad input".into())));
        let err = stopping.apply(&json!({}), 0, &tolerable()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Design 'd' failed on attribute 'x' for document #0: Design stopped. bad input"
        );
    }

    #[test]
    fn test_skip_condition() {
        let design = RecordDesign::new("d")
            .set_id(|_| Err(EvalError::Failed("never evaluated".into())))
            .set_skip_condition(constant(json!(true)));
        assert!(matches!(
            design.apply(&json!({}), 0, &tolerable()).unwrap(),
            ApplyOutcome::Skipped
        ));

        let design = RecordDesign::new("d")
            .set_id(constant(json!("X")))
            .set_skip_condition(constant(json!(0)));
        assert!(matches!(
            design.apply(&json!({}), 0, &tolerable()).unwrap(),
            ApplyOutcome::Recorded { .. }
        ));
    }

    #[test]
    fn test_repeatable_attribute_yields_unique_tuples() {
        let design = RecordDesign::new("d")
            .set_id(constant(json!("X")))
            .add_value("tag", constant(json!("a")))
            .add_value("tag", constant(json!("b")))
            .add_value("tag", constant(json!("c")))
            .add_value("tag", constant(json!("a")));
        let (record, _, _) = recorded(design.apply(&json!({}), 0, &tolerable()).unwrap());
        assert_eq!(record.values_of("tag").count(), 3);
    }

    #[test]
    fn test_backlinks_become_rules() {
        let design = RecordDesign::new("d")
            .set_id(constant(json!("B")))
            .add_backlink("refs", "inverse-of-refs");
        assert_eq!(design.attribute_keys().count(), 0);
        let (record, rules, _) = recorded(design.apply(&json!({}), 0, &tolerable()).unwrap());
        assert!(record.is_empty());
        let condition = Condition {
            forward_link_type: "refs".into(),
            receiver: "B".into(),
        };
        assert_eq!(
            rules.get(&condition),
            Some(&Reaction {
                receiver: "B".into(),
                backward_link_type: "inverse-of-refs".into()
            })
        );
    }
}
