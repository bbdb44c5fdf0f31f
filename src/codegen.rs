//! Codegen module for the designer
//!
//! Turns a block graph into source text for one target language. The
//! traversal and the per-block rules live here; everything that depends on
//! the target's literal syntax is behind [`MappingBackend`].
//!
//! ## Invariants
//!
//! 1. Each `generate` call walks the graph exactly once, post-order: value
//!    slots are resolved before their parent's fragment is emitted.
//! 2. Output is deterministic for a given graph and backend.
//! 3. A missing optional slot degrades to an empty fragment, never an error.
//!    Only structural problems (incomplete profile, a statement block in a
//!    value slot or vice versa) abort generation.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;

use crate::blocks::{
    AttributeBlock, AttributeReferenceBlock, BacklinkBlock, Block, BlockGraph, ControlBlock,
    ControlKind, InputBlock, ListBlock, Literal, LiteralBlock, ProfileBlock, QueryLanguage,
    QuerySource, RecordBlock,
};
use crate::errors::GenerateError;

lazy_static! {
    static ref LEADING_BLANK: Regex = Regex::new(r"\A\s+\n").unwrap();
    static ref TRAILING_BLANK: Regex = Regex::new(r"\n\s+\z").unwrap();
    static ref TRAILING_SPACES: Regex = Regex::new(r"[ \t]+\n").unwrap();
}

const DEFAULT_STOP_MESSAGE: &str = "No error message provided";

// ═══════════════════════════════════════════════════════════════════════════════
// FRAGMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Precedence classes the shared rules ask for. Backends map them to their
/// language's numeric order values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Atomic,
    Collection,
    None,
}

/// What a block contributes to the program.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Statement(String),
    /// Expression text and its precedence order value.
    Expression(String, f64),
}

/// Named preamble declarations. Registering a name twice keeps the first
/// definition, so each import or bootstrap line is emitted once.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    entries: IndexMap<String, String>,
}

impl Definitions {
    pub fn insert(&mut self, name: &str, code: impl Into<String>) {
        self.entries
            .entry(name.to_string())
            .or_insert_with(|| code.into());
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Prefixes every line of `text`, except after a final newline.
pub fn prefix_lines(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len() + prefix.len());
    out.push_str(prefix);
    let body = text.strip_suffix('\n');
    let (body, trailing) = match body {
        Some(body) => (body, "\n"),
        None => (text, ""),
    };
    out.push_str(&body.replace('\n', &format!("\n{}", prefix)));
    out.push_str(trailing);
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// BACKEND CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

/// Language-specific emission rules every target backend supplies.
pub trait MappingBackend {
    fn name(&self) -> &'static str;

    fn indent(&self) -> &str;

    fn quote_string(&self, value: &str) -> String;

    fn line_comment(&self, text: &str) -> String;

    fn order_of(&self, order: Order) -> f64;

    /// Wraps an expression so the runtime evaluates it lazily.
    fn thunk(&self, body: &str) -> String;

    fn to_string_call(&self, expr: &str) -> String;

    fn json_pointer_call(&self, pointer_expr: &str) -> String;

    fn json_path_call(&self, path_expr: &str) -> String;

    fn true_literal(&self) -> &'static str;

    fn false_literal(&self) -> &'static str;

    fn null_literal(&self) -> &'static str;

    /// Opens the builder expression registering one design.
    fn design_open(&self) -> String;

    fn design_close(&self) -> String;

    /// Constructor prefix of the backlink sentinel, e.g. `BackwardLinkFor(`.
    fn backlink_prefix(&self) -> &'static str;

    /// Turns an expression block left at top level into a statement.
    fn naked_value(&self, code: &str) -> String;

    fn register_definitions(&self, definitions: &mut Definitions);

    /// Joins the preamble, the program body and the runtime entry call.
    fn finish(&self, code: &str, definitions: &Definitions) -> String;

    /// True for code that is empty or only an empty string literal.
    fn is_empty_literal(&self, code: &str) -> bool {
        let code = code.trim();
        code.is_empty() || code == "''" || code == "\"\""
    }

    fn indent_nonempty_lines(&self, text: &str, prefix: &str) -> String {
        if self.is_empty_literal(text) {
            text.to_string()
        } else {
            prefix_lines(text, prefix)
        }
    }

    fn set_id_chain_call(&self, id_expr: &str) -> String {
        if self.is_empty_literal(id_expr) {
            String::new()
        } else {
            format!(".setId({})\n", self.thunk(&self.to_string_call(id_expr)))
        }
    }

    fn set_skip_condition_chain_call(&self, condition_expr: &str) -> String {
        format!(".setSkipCondition({})\n", self.thunk(condition_expr))
    }

    /// Backlink sentinels are passed as they are; every other value is
    /// wrapped in a thunk.
    fn add_attribute_chain_call(&self, key_expr: &str, value_expr: &str) -> String {
        if value_expr.starts_with(self.backlink_prefix()) {
            format!(".addAttribute({}, {})\n", key_expr, value_expr)
        } else {
            format!(".addAttribute({}, {})\n", key_expr, self.thunk(value_expr))
        }
    }

    fn backlink_call(&self, key_expr: &str) -> String {
        format!("{}{})", self.backlink_prefix(), key_expr)
    }

    fn stop_call(&self, message_expr: &str) -> String {
        format!("stop_with_fail({})", message_expr)
    }

    fn log_call(&self, value_expr: &str, description_expr: &str) -> String {
        format!("log({}, {})", value_expr, description_expr)
    }

    fn otherwise_call(&self, value_expr: &str, other_expr: &str) -> String {
        format!(
            "otherwise({}, {})",
            self.thunk(value_expr),
            self.thunk(other_expr)
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATOR
// ═══════════════════════════════════════════════════════════════════════════════

pub struct CodeGenerator<'a> {
    backend: &'a dyn MappingBackend,
    emit_block_comments: bool,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(backend: &'a dyn MappingBackend) -> Self {
        Self {
            backend,
            emit_block_comments: true,
        }
    }

    pub fn with_block_comments(mut self, enabled: bool) -> Self {
        self.emit_block_comments = enabled;
        self
    }

    /// Emits the complete program for `graph`.
    pub fn generate(&self, graph: &BlockGraph) -> Result<String, GenerateError> {
        let mut definitions = Definitions::default();
        self.backend.register_definitions(&mut definitions);

        let mut stacks = Vec::with_capacity(graph.stacks.len());
        for stack in &graph.stacks {
            let mut code = String::new();
            for block in stack {
                match self.block_to_code(block)? {
                    Fragment::Statement(statement) => code.push_str(&statement),
                    Fragment::Expression(expr, _) if !expr.is_empty() => {
                        code.push_str(&self.backend.naked_value(&expr))
                    }
                    Fragment::Expression(..) => {}
                }
            }
            if !code.is_empty() {
                stacks.push(code);
            }
        }

        let code = self.backend.finish(&stacks.join("\n"), &definitions);
        let code = LEADING_BLANK.replace(&code, "");
        let code = TRAILING_BLANK.replace(&code, "\n");
        let code = TRAILING_SPACES.replace_all(&code, "\n");

        tracing::debug!(
            backend = self.backend.name(),
            stacks = graph.stacks.len(),
            bytes = code.len(),
            "generated program"
        );
        Ok(code.into_owned())
    }

    fn comment(&self, text: &str) -> String {
        if self.emit_block_comments {
            self.backend.line_comment(text)
        } else {
            String::new()
        }
    }

    /// The single dispatch point over block kinds.
    pub fn block_to_code(&self, block: &Block) -> Result<Fragment, GenerateError> {
        match block {
            Block::Record(record) => self.record_to_code(record),
            Block::Attribute(attribute) => self.attribute_to_code(attribute),
            Block::Profile(profile) => self.profile_to_code(profile),
            Block::Input(input) => self.input_to_code(input),
            Block::Control(control) => self.control_to_code(control),
            Block::Backlink(backlink) => self.backlink_to_code(backlink),
            Block::AttributeReference(reference) => Ok(self.reference_to_code(reference)),
            Block::Literal(literal) => Ok(self.literal_to_code(literal)),
            Block::List(list) => self.list_to_code(list),
        }
    }

    /// Code of the block in a value slot, parenthesized against `outer`.
    fn value_to_code(&self, slot: Option<&Block>, outer: Order) -> Result<String, GenerateError> {
        let Some(block) = slot else {
            return Ok(String::new());
        };
        let (code, inner) = match self.block_to_code(block)? {
            Fragment::Expression(code, inner) => (code, inner),
            Fragment::Statement(_) => {
                return Err(GenerateError::MalformedGraph(format!(
                    "Statement block '{}' ({}) is connected to a value slot",
                    block.id(),
                    block.block_type().as_str()
                )))
            }
        };
        if code.is_empty() {
            return Ok(code);
        }

        let outer = self.backend.order_of(outer);
        let atomic = self.backend.order_of(Order::Atomic);
        let none = self.backend.order_of(Order::None);
        let exempt = outer == inner && (outer == atomic || outer == none);
        if outer <= inner && !exempt {
            Ok(format!("({})", code))
        } else {
            Ok(code)
        }
    }

    /// Concatenated code of a statement slot, indented one level.
    fn statements_to_code(&self, blocks: &[Block]) -> Result<String, GenerateError> {
        let mut code = String::new();
        for block in blocks {
            match self.block_to_code(block)? {
                Fragment::Statement(statement) => code.push_str(&statement),
                Fragment::Expression(..) => {
                    return Err(GenerateError::MalformedGraph(format!(
                        "Value block '{}' ({}) is connected to a statement slot",
                        block.id(),
                        block.block_type().as_str()
                    )))
                }
            }
        }
        if code.is_empty() {
            Ok(code)
        } else {
            Ok(prefix_lines(&code, self.backend.indent()))
        }
    }

    fn expression(&self, code: String, order: Order) -> Fragment {
        Fragment::Expression(code, self.backend.order_of(order))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Statements
    // ───────────────────────────────────────────────────────────────────────────

    fn record_to_code(&self, record: &RecordBlock) -> Result<Fragment, GenerateError> {
        record.reject_nested_records()?;
        let backend = self.backend;
        let id = self.value_to_code(record.local_id.as_deref(), Order::Atomic)?;
        let skip = if record.is_skippable() {
            self.value_to_code(record.skip_condition.as_deref(), Order::Atomic)?
        } else {
            String::new()
        };
        let body = self.statements_to_code(&record.body)?;

        let mut code = self.comment(record.block_type.as_str());
        code.push_str(&backend.design_open());
        code.push_str(&backend.indent_nonempty_lines(&backend.set_id_chain_call(&id), backend.indent()));
        if !skip.trim().is_empty() {
            code.push_str(&backend.indent_nonempty_lines(
                &backend.set_skip_condition_chain_call(&skip),
                backend.indent(),
            ));
        }
        code.push_str(&body);
        code.push_str(&backend.design_close());
        Ok(Fragment::Statement(code))
    }

    fn attribute_to_code(&self, attribute: &AttributeBlock) -> Result<Fragment, GenerateError> {
        let key = self.value_to_code(attribute.key.as_deref(), Order::Atomic)?;
        let value = self.value_to_code(attribute.value.as_deref(), Order::Atomic)?;

        let mut code = String::new();
        if !self.backend.is_empty_literal(&key) && !self.backend.is_empty_literal(&value) {
            code.push_str(&self.comment("## attribute_key ##"));
            code.push_str(&self.backend.add_attribute_chain_call(&key, &value));
        } else {
            tracing::debug!(block = %attribute.id, "attribute dropped: empty key or value");
        }
        Ok(Fragment::Statement(code))
    }

    fn profile_to_code(&self, profile: &ProfileBlock) -> Result<Fragment, GenerateError> {
        let backend = self.backend;
        let (descriptor, attribute_key) = profile.contract()?;

        let mut code = self.comment("## profile_hmc ##");
        code.push_str(&self.comment("attribute: Self-Reference"));
        code.push_str(&backend.add_attribute_chain_call(
            &backend.quote_string(attribute_key),
            &backend.quote_string(&descriptor.identifier),
        ));

        for input in &profile.inputs {
            let Some(pid) = descriptor.pid_for_input(&input.name) else {
                tracing::debug!(block = %profile.id, input = %input.name, "no property PID for input");
                continue;
            };
            let value = self.value_to_code(Some(&input.value), Order::Atomic)?;
            if backend.is_empty_literal(&value) {
                continue;
            }
            code.push_str(&self.comment(&format!("attribute: {}", input.name)));
            code.push_str(&backend.add_attribute_chain_call(&backend.quote_string(pid), &value));
        }
        Ok(Fragment::Statement(code))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Expressions
    // ───────────────────────────────────────────────────────────────────────────

    fn input_to_code(&self, input: &InputBlock) -> Result<Fragment, GenerateError> {
        let query = match &input.query {
            QuerySource::Field(query) => self.backend.quote_string(query),
            QuerySource::Slot(slot) => self.value_to_code(slot.as_deref(), Order::Atomic)?,
        };
        if query.is_empty() {
            return Ok(self.expression(String::new(), Order::Atomic));
        }
        let call = match input.language {
            QueryLanguage::JsonPointer => self.backend.json_pointer_call(&query),
            QueryLanguage::JsonPath => self.backend.json_path_call(&query),
        };
        Ok(self.expression(call, Order::Atomic))
    }

    fn control_to_code(&self, control: &ControlBlock) -> Result<Fragment, GenerateError> {
        let backend = self.backend;
        match &control.kind {
            ControlKind::Stop { message } => {
                let mut message = self.value_to_code(message.as_deref(), Order::Atomic)?;
                if message.trim().is_empty() {
                    message = backend.quote_string(DEFAULT_STOP_MESSAGE);
                }
                Ok(self.expression(backend.stop_call(&message), Order::Atomic))
            }
            ControlKind::Log { description, value } => {
                let value = self.value_or_null(value.as_deref())?;
                let call = backend.log_call(&value, &backend.quote_string(description));
                Ok(self.expression(call, Order::None))
            }
            ControlKind::Otherwise { value, other } => {
                let value = self.value_or_null(value.as_deref())?;
                let other = self.value_or_null(other.as_deref())?;
                Ok(self.expression(backend.otherwise_call(&value, &other), Order::None))
            }
        }
    }

    fn value_or_null(&self, slot: Option<&Block>) -> Result<String, GenerateError> {
        let code = self.value_to_code(slot, Order::Atomic)?;
        if code.is_empty() {
            Ok(self.backend.null_literal().to_string())
        } else {
            Ok(code)
        }
    }

    fn backlink_to_code(&self, backlink: &BacklinkBlock) -> Result<Fragment, GenerateError> {
        let key = self.value_to_code(backlink.attribute_key.as_deref(), Order::Atomic)?;
        if self.backend.is_empty_literal(&key) {
            return Ok(self.expression(String::new(), Order::Atomic));
        }
        Ok(self.expression(self.backend.backlink_call(&key), Order::Atomic))
    }

    fn reference_to_code(&self, reference: &AttributeReferenceBlock) -> Fragment {
        if reference.pid.is_empty() {
            return self.expression(String::new(), Order::Atomic);
        }
        self.expression(self.backend.quote_string(&reference.pid), Order::Atomic)
    }

    fn literal_to_code(&self, literal: &LiteralBlock) -> Fragment {
        let backend = self.backend;
        let code = match &literal.value {
            Literal::Text(text) => backend.quote_string(text),
            Literal::Number(number) => number.to_string(),
            Literal::Bool(true) => backend.true_literal().to_string(),
            Literal::Bool(false) => backend.false_literal().to_string(),
            Literal::Null => backend.null_literal().to_string(),
        };
        self.expression(code, Order::Atomic)
    }

    fn list_to_code(&self, list: &ListBlock) -> Result<Fragment, GenerateError> {
        let mut values = Vec::with_capacity(list.items.len());
        for item in &list.items {
            match self.block_to_code(item)? {
                Fragment::Expression(code, _) if !code.is_empty() => values.push(code),
                Fragment::Expression(..) => {}
                Fragment::Statement(_) => {
                    return Err(GenerateError::MalformedGraph(format!(
                        "Statement block '{}' ({}) is connected to a list item",
                        item.id(),
                        item.block_type().as_str()
                    )))
                }
            }
        }
        let code = if values.is_empty() {
            "[]".to_string()
        } else {
            format!(
                "[\n{}]",
                prefix_lines(&values.join(", "), self.backend.indent())
            )
        };
        Ok(self.expression(code, Order::Collection))
    }
}

/// Generates the program for `graph` with default generator options.
pub fn generate(backend: &dyn MappingBackend, graph: &BlockGraph) -> Result<String, GenerateError> {
    CodeGenerator::new(backend).generate(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_lines() {
        assert_eq!(prefix_lines("a\nb\n", "  "), "  a\n  b\n");
        assert_eq!(prefix_lines("a\nb", "# "), "# a\n# b");
        assert_eq!(prefix_lines("", "  "), "  ");
    }

    #[test]
    fn test_definitions_keep_first() {
        let mut defs = Definitions::default();
        defs.insert("executor", "first");
        defs.insert("executor", "second");
        defs.insert("import", "import x");
        assert_eq!(defs.len(), 2);
        assert_eq!(defs.values().collect::<Vec<_>>(), vec!["first", "import x"]);
    }
}
