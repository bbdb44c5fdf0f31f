use serde::{Deserialize, Serialize};

use crate::blocks::{
    AttributeBlock, Block, BlockGraph, InputBlock, Literal, ProfileBlock, QueryLanguage,
    RecordBlock,
};
use crate::path::parse_pointer;
use crate::visitor::{
    walk_attribute, walk_block, walk_input, walk_profile, walk_record, BlockVisitor,
};

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const DIAG_RECORD_WITHOUT_ID: &str = "D001";
pub const DIAG_ATTRIBUTE_DROPPED: &str = "D002";
pub const DIAG_INCOMPLETE_PROFILE: &str = "D003";
pub const DIAG_INVALID_POINTER: &str = "D004";
pub const DIAG_ORPHAN_STATEMENT: &str = "D005";

fn get_consequence(code: &str) -> &'static str {
    match code {
        DIAG_RECORD_WITHOUT_ID => "Every document applied to this design aborts the run.",
        DIAG_ATTRIBUTE_DROPPED => "The attribute is left out of the generated program.",
        DIAG_INCOMPLETE_PROFILE => "Code generation fails until the profile is complete.",
        DIAG_INVALID_POINTER => "Every evaluation of this query is a fatal syntax error.",
        DIAG_ORPHAN_STATEMENT => "The block belongs to no record and has no effect.",
        _ => "Unknown diagnostic.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub consequence: String,
    pub block_id: String,
    pub hints: Vec<String>,
}

impl Diagnostic {
    pub fn new(code: &str, message: &str, block_id: &str) -> Self {
        Self::with_hints(code, message, block_id, vec![])
    }

    pub fn with_hints(code: &str, message: &str, block_id: &str, hints: Vec<String>) -> Self {
        Diagnostic {
            code: code.to_string(),
            message: message.to_string(),
            consequence: get_consequence(code).to_string(),
            block_id: block_id.to_string(),
            hints,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION PASS
// ═══════════════════════════════════════════════════════════════════════════════

pub(crate) fn is_empty_slot(slot: Option<&Block>) -> bool {
    match slot {
        None => true,
        Some(Block::Literal(literal)) => {
            matches!(&literal.value, Literal::Text(text) if text.is_empty())
        }
        Some(_) => false,
    }
}

#[derive(Default)]
struct Validator {
    record_depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn require_record(&mut self, block: &Block) {
        if self.record_depth == 0 {
            self.diagnostics.push(Diagnostic::new(
                DIAG_ORPHAN_STATEMENT,
                &format!(
                    "'{}' block is not placed inside a record",
                    block.block_type().as_str()
                ),
                block.id(),
            ));
        }
    }
}

impl BlockVisitor for Validator {
    fn visit_block(&mut self, block: &Block) {
        if matches!(block, Block::Attribute(_) | Block::Profile(_)) {
            self.require_record(block);
        }
        walk_block(self, block);
    }

    fn visit_record(&mut self, record: &RecordBlock) {
        if record.local_id.is_none() {
            self.diagnostics.push(Diagnostic::with_hints(
                DIAG_RECORD_WITHOUT_ID,
                "Record has no local identifier",
                &record.id,
                vec!["Connect a query or text block to the 'local-id' slot.".to_string()],
            ));
        }
        self.record_depth += 1;
        walk_record(self, record);
        self.record_depth -= 1;
    }

    fn visit_attribute(&mut self, attribute: &AttributeBlock) {
        let missing = match (
            is_empty_slot(attribute.key.as_deref()),
            is_empty_slot(attribute.value.as_deref()),
        ) {
            (true, true) => Some("key and value"),
            (true, false) => Some("key"),
            (false, true) => Some("value"),
            (false, false) => None,
        };
        if let Some(missing) = missing {
            self.diagnostics.push(Diagnostic::new(
                DIAG_ATTRIBUTE_DROPPED,
                &format!("Attribute has no {}", missing),
                &attribute.id,
            ));
        }
        walk_attribute(self, attribute);
    }

    fn visit_profile(&mut self, profile: &ProfileBlock) {
        if let Err(e) = profile.contract() {
            self.diagnostics.push(Diagnostic::new(
                DIAG_INCOMPLETE_PROFILE,
                &e.to_string(),
                &profile.id,
            ));
        }
        walk_profile(self, profile);
    }

    fn visit_input(&mut self, input: &InputBlock) {
        if input.language == QueryLanguage::JsonPointer {
            if let Some(query) = input.literal_query() {
                if let Err(e) = parse_pointer(query) {
                    self.diagnostics.push(Diagnostic::with_hints(
                        DIAG_INVALID_POINTER,
                        &e.to_string(),
                        &input.id,
                        vec!["A JSON Pointer is empty or starts with '/'.".to_string()],
                    ));
                }
            }
        }
        walk_input(self, input);
    }
}

/// Collects non-fatal diagnostics for a block graph in document order.
pub fn validate_graph(graph: &BlockGraph) -> Vec<Diagnostic> {
    let mut validator = Validator::default();
    validator.visit_graph(graph);
    validator.diagnostics
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUERY INVENTORY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryUse {
    pub block_id: String,
    pub language: QueryLanguage,
    pub query: String,
}

#[derive(Default)]
struct QueryCollector {
    uses: Vec<QueryUse>,
}

impl BlockVisitor for QueryCollector {
    fn visit_input(&mut self, input: &InputBlock) {
        if let Some(query) = input.literal_query() {
            self.uses.push(QueryUse {
                block_id: input.id.clone(),
                language: input.language,
                query: query.to_string(),
            });
        }
        walk_input(self, input);
    }
}

/// Lists every statically known query of the graph, e.g. so a path picker
/// can highlight paths that are already in use.
pub fn collect_query_paths(graph: &BlockGraph) -> Vec<QueryUse> {
    let mut collector = QueryCollector::default();
    collector.visit_graph(graph);
    collector.uses
}
