//! In-process lowering of a block graph into runtime record designs.
//!
//! The designs produced here behave like the programs the backends emit,
//! without a round trip through an external interpreter. Fragments that the
//! code generator would render as empty code (unconnected slots, queries
//! without text, backlinks without a key) lower to "no evaluator" and drop
//! the statement they belong to in the same places.

use serde_json::Value;

use crate::blocks::{
    AttributeBlock, BacklinkBlock, Block, BlockGraph, ControlBlock, ControlKind, InputBlock,
    ProfileBlock, QueryLanguage, QuerySource, RecordBlock,
};
use crate::errors::{EvalError, GenerateError, QueryError};
use crate::query::{find_all, resolve_pointer, type_name};
use crate::runtime::{
    constant, log_value, otherwise, stop_with_fail, AttributeSource, BackwardLinkFor, EvalContext,
    Evaluator, RecordDesign,
};
use crate::validate::is_empty_slot;

/// Lowers every record block of `graph` into a design, in graph order.
pub fn lower_graph(graph: &BlockGraph) -> Result<Vec<RecordDesign>, GenerateError> {
    let mut designs = Vec::new();
    for block in graph.top_level() {
        match block {
            Block::Record(record) => lower_record(record, &mut designs)?,
            other => {
                tracing::debug!(
                    block = other.id(),
                    block_type = other.block_type().as_str(),
                    "top-level block outside a record has no effect"
                );
            }
        }
    }
    tracing::debug!(designs = designs.len(), "lowered block graph");
    Ok(designs)
}

fn lower_record(record: &RecordBlock, designs: &mut Vec<RecordDesign>) -> Result<(), GenerateError> {
    record.reject_nested_records()?;
    let mut design = RecordDesign::new(record.id.clone());
    if let Some(id) = compile_slot(record.local_id.as_deref())? {
        design = design.set_id(id);
    }
    if record.is_skippable() {
        if let Some(condition) = compile_slot(record.skip_condition.as_deref())? {
            design = design.set_skip_condition(condition);
        }
    }

    for statement in &record.body {
        design = match statement {
            Block::Attribute(attribute) => lower_attribute(design, attribute)?,
            Block::Profile(profile) => lower_profile(design, profile)?,
            other => {
                return Err(GenerateError::MalformedGraph(format!(
                    "Value block '{}' ({}) is connected to a statement slot",
                    other.id(),
                    other.block_type().as_str()
                )))
            }
        };
    }

    designs.push(design);
    Ok(())
}

fn lower_attribute(
    design: RecordDesign,
    attribute: &AttributeBlock,
) -> Result<RecordDesign, GenerateError> {
    let (key, value) = (attribute.key.as_deref(), attribute.value.as_deref());
    let (Some(key), Some(value)) = (key, value) else {
        tracing::debug!(block = %attribute.id, "attribute dropped: empty key or value");
        return Ok(design);
    };
    if is_empty_slot(Some(key)) || is_empty_slot(Some(value)) {
        tracing::debug!(block = %attribute.id, "attribute dropped: empty key or value");
        return Ok(design);
    }
    match static_string(key)? {
        Some(key) => add_source(design, key, value),
        None => Ok(design),
    }
}

fn lower_profile(design: RecordDesign, profile: &ProfileBlock) -> Result<RecordDesign, GenerateError> {
    let (descriptor, attribute_key) = profile.contract()?;
    let mut design = design.add_value(
        attribute_key.to_string(),
        constant(Value::String(descriptor.identifier.clone())),
    );
    for input in &profile.inputs {
        let Some(pid) = descriptor.pid_for_input(&input.name) else {
            tracing::debug!(block = %profile.id, input = %input.name, "no property PID for input");
            continue;
        };
        if is_empty_slot(Some(&input.value)) {
            continue;
        }
        design = add_source(design, pid.to_string(), &input.value)?;
    }
    Ok(design)
}

/// Registers `value` under `key`: a backlink declaration becomes a rule,
/// anything else a value evaluator.
fn add_source(design: RecordDesign, key: String, value: &Block) -> Result<RecordDesign, GenerateError> {
    if let Block::Backlink(backlink) = value {
        return Ok(match backlink_key(backlink)? {
            Some(forward) => {
                design.add_attribute(key, AttributeSource::Backlink(BackwardLinkFor::new(forward)))
            }
            None => design,
        });
    }
    Ok(match compile(value)? {
        Some(evaluator) => design.add_attribute(key, AttributeSource::Value(evaluator)),
        None => design,
    })
}

fn backlink_key(backlink: &BacklinkBlock) -> Result<Option<String>, GenerateError> {
    match backlink.attribute_key.as_deref() {
        Some(block) if !is_empty_slot(Some(block)) => static_string(block),
        _ => Ok(None),
    }
}

/// Evaluates a key block once against an empty document. Keys must not
/// depend on the document.
fn static_string(block: &Block) -> Result<Option<String>, GenerateError> {
    let non_static = |reason: String| GenerateError::NonStaticKey {
        block_id: block.id().to_string(),
        reason,
    };
    let Some(evaluator) = compile(block)? else {
        return Ok(None);
    };
    let context = EvalContext {
        document: &Value::Null,
        document_index: 0,
        design: "",
    };
    match evaluator(&context).map_err(|e| non_static(e.to_string()))? {
        Value::String(key) if key.is_empty() => Ok(None),
        Value::String(key) => Ok(Some(key)),
        other => Err(non_static(format!("expected a string, got {}", type_name(&other)))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION COMPILATION
// ═══════════════════════════════════════════════════════════════════════════════

fn compile_slot(slot: Option<&Block>) -> Result<Option<Evaluator>, GenerateError> {
    match slot {
        Some(block) => compile(block),
        None => Ok(None),
    }
}

fn boxed<F>(evaluator: F) -> Evaluator
where
    F: Fn(&EvalContext<'_>) -> Result<Value, EvalError> + 'static,
{
    Box::new(evaluator)
}

fn null_if_empty(evaluator: Option<Evaluator>) -> Evaluator {
    match evaluator {
        Some(evaluator) => evaluator,
        None => boxed(constant(Value::Null)),
    }
}

/// Compiles a value block into an evaluator. `None` marks a fragment that
/// would generate no code.
fn compile(block: &Block) -> Result<Option<Evaluator>, GenerateError> {
    match block {
        Block::Input(input) => compile_input(input),
        Block::Control(control) => compile_control(control).map(Some),
        Block::Literal(literal) => Ok(Some(boxed(constant(literal.value.to_json())))),
        Block::AttributeReference(reference) if reference.pid.is_empty() => Ok(None),
        Block::AttributeReference(reference) => {
            Ok(Some(boxed(constant(Value::String(reference.pid.clone())))))
        }
        Block::List(list) => {
            let mut items = Vec::with_capacity(list.items.len());
            for item in &list.items {
                if let Some(evaluator) = compile(item)? {
                    items.push(evaluator);
                }
            }
            Ok(Some(boxed(move |ctx: &EvalContext<'_>| {
                items
                    .iter()
                    .map(|item| item(ctx))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            })))
        }
        Block::Backlink(backlink) => Err(GenerateError::MalformedGraph(format!(
            "Backlink declaration '{}' must be connected directly to an attribute value",
            backlink.id
        ))),
        Block::Record(_) | Block::Attribute(_) | Block::Profile(_) => {
            Err(GenerateError::MalformedGraph(format!(
                "Statement block '{}' ({}) is connected to a value slot",
                block.id(),
                block.block_type().as_str()
            )))
        }
    }
}

fn run_query(language: QueryLanguage, query: &str, document: &Value) -> Result<Value, EvalError> {
    match language {
        QueryLanguage::JsonPointer => Ok(resolve_pointer(query, document)?.clone()),
        QueryLanguage::JsonPath => Ok(Value::Array(find_all(query, document)?)),
    }
}

fn compile_input(input: &InputBlock) -> Result<Option<Evaluator>, GenerateError> {
    let language = input.language;
    match &input.query {
        QuerySource::Field(query) if query.is_empty() => Ok(None),
        QuerySource::Field(query) => {
            let query = query.clone();
            Ok(Some(boxed(move |ctx: &EvalContext<'_>| {
                run_query(language, &query, ctx.document)
            })))
        }
        QuerySource::Slot(slot) => {
            let Some(query) = compile_slot(slot.as_deref())? else {
                return Ok(None);
            };
            Ok(Some(boxed(move |ctx: &EvalContext<'_>| match query(ctx)? {
                Value::String(query) => run_query(language, &query, ctx.document),
                other => Err(QueryError::NonStringQuery {
                    found: type_name(&other),
                }
                .into()),
            })))
        }
    }
}

fn compile_control(control: &ControlBlock) -> Result<Evaluator, GenerateError> {
    match &control.kind {
        ControlKind::Stop { message } => {
            let message = compile_slot(message.as_deref())?;
            Ok(boxed(move |ctx: &EvalContext<'_>| {
                let text = match &message {
                    Some(message) => match message(ctx)? {
                        Value::String(text) => text,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    },
                    None => String::new(),
                };
                Err(stop_with_fail(Some(&text)))
            }))
        }
        ControlKind::Log { description, value } => {
            let value = null_if_empty(compile_slot(value.as_deref())?);
            let description = description.clone();
            Ok(boxed(move |ctx: &EvalContext<'_>| {
                Ok(log_value(value(ctx)?, &description))
            }))
        }
        ControlKind::Otherwise { value, other } => {
            let value = null_if_empty(compile_slot(value.as_deref())?);
            let other = null_if_empty(compile_slot(other.as_deref())?);
            Ok(boxed(move |ctx: &EvalContext<'_>| {
                otherwise(value(ctx), || other(ctx))
            }))
        }
    }
}

#[cfg(test)]
#[path = "interpret_tests.rs"]
mod tests;
