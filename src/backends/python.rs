//! Python backend. The program runs in an external interpreter next to the
//! `executor`, `conditionals` and `jsonpath` modules.

use lazy_static::lazy_static;
use regex::Regex;

use super::{escape_string_body, DEFAULT_INDENT};
use crate::codegen::{prefix_lines, Definitions, MappingBackend, Order};

lazy_static! {
    static ref IMPORT_LINE: Regex = Regex::new(r"^(from\s+\S+\s+)?import\s+\S+").unwrap();
    static ref BLANK_RUNS: Regex = Regex::new(r"\n\n+").unwrap();
    static ref TRAILING_NEWLINES: Regex = Regex::new(r"\n*\z").unwrap();
}

const ORDER_ATOMIC: f64 = 0.0;
const ORDER_COLLECTION: f64 = 1.0;
const ORDER_NONE: f64 = 99.0;

#[derive(Debug, Clone)]
pub struct PythonBackend {
    indent: String,
}

impl Default for PythonBackend {
    fn default() -> Self {
        Self::new(DEFAULT_INDENT)
    }
}

impl PythonBackend {
    pub fn new(indent: usize) -> Self {
        Self {
            indent: " ".repeat(indent),
        }
    }
}

impl MappingBackend for PythonBackend {
    fn name(&self) -> &'static str {
        "python"
    }

    fn indent(&self) -> &str {
        &self.indent
    }

    /// Single quotes unless the text holds a single quote and no double one.
    fn quote_string(&self, value: &str) -> String {
        let mut escaped = escape_string_body(value);
        let mut quote = '\'';
        if escaped.contains('\'') {
            if escaped.contains('"') {
                escaped = escaped.replace('\'', "\\'");
            } else {
                quote = '"';
            }
        }
        format!("{quote}{escaped}{quote}")
    }

    fn line_comment(&self, text: &str) -> String {
        prefix_lines(&format!("{}\n", text), "# ")
    }

    fn order_of(&self, order: Order) -> f64 {
        match order {
            Order::Atomic => ORDER_ATOMIC,
            Order::Collection => ORDER_COLLECTION,
            Order::None => ORDER_NONE,
        }
    }

    fn thunk(&self, body: &str) -> String {
        format!("lambda: {}", body)
    }

    fn to_string_call(&self, expr: &str) -> String {
        format!("str({})", expr)
    }

    fn json_pointer_call(&self, pointer_expr: &str) -> String {
        format!(
            "jsonpath.pointer.resolve({}, executor.current_source_json)",
            pointer_expr
        )
    }

    fn json_path_call(&self, path_expr: &str) -> String {
        format!("jsonpath.findall({}, executor.current_source_json)", path_expr)
    }

    fn true_literal(&self) -> &'static str {
        "True"
    }

    fn false_literal(&self) -> &'static str {
        "False"
    }

    fn null_literal(&self) -> &'static str {
        "None"
    }

    fn design_open(&self) -> String {
        "EXECUTOR.addDesign(RecordDesign()\n".to_string()
    }

    fn design_close(&self) -> String {
        ")\n".to_string()
    }

    fn backlink_prefix(&self) -> &'static str {
        "BackwardLinkFor("
    }

    fn naked_value(&self, code: &str) -> String {
        format!("{}\n", code)
    }

    fn register_definitions(&self, definitions: &mut Definitions) {
        definitions.insert("import-main", "import executor");
        definitions.insert(
            "import-from-main",
            "from executor import RecordDesign, Executor, BackwardLinkFor, log",
        );
        definitions.insert("import-from-conditionals", "from conditionals import *");
        definitions.insert("import-jsonpath", "import jsonpath");
        definitions.insert("executor", "EXECUTOR: Executor = Executor()");
    }

    /// Imports first, then the remaining declarations, separated by one
    /// blank line and followed by two.
    fn finish(&self, code: &str, definitions: &Definitions) -> String {
        let (imports, others): (Vec<&str>, Vec<&str>) =
            definitions.values().partition(|def| IMPORT_LINE.is_match(def));
        let all = format!("{}\n\n{}", imports.join("\n"), others.join("\n\n"));
        let all = BLANK_RUNS.replace_all(&all, "\n\n");
        let all = TRAILING_NEWLINES.replace(&all, "\n\n\n");
        format!("{}{}\nEXECUTOR.execute()\n", all, code)
    }
}
