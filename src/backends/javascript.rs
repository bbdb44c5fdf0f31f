//! JavaScript backend. The program runs inside the in-process sandbox,
//! which provides `Executor`, `RecordDesign`, `jsonpointer`, `jsonpath` and
//! the `INPUT_DOCUMENTS` array.

use super::{escape_string_body, DEFAULT_INDENT};
use crate::codegen::{prefix_lines, Definitions, MappingBackend, Order};

const ORDER_ATOMIC: f64 = 0.0;
const ORDER_MEMBER: f64 = 1.2;
const ORDER_NONE: f64 = 99.0;

#[derive(Debug, Clone)]
pub struct JavascriptBackend {
    indent: String,
}

impl Default for JavascriptBackend {
    fn default() -> Self {
        Self::new(DEFAULT_INDENT)
    }
}

impl JavascriptBackend {
    pub fn new(indent: usize) -> Self {
        Self {
            indent: " ".repeat(indent),
        }
    }
}

impl MappingBackend for JavascriptBackend {
    fn name(&self) -> &'static str {
        "javascript"
    }

    fn indent(&self) -> &str {
        &self.indent
    }

    fn quote_string(&self, value: &str) -> String {
        let escaped = escape_string_body(value).replace('\'', "\\'");
        format!("'{}'", escaped)
    }

    fn line_comment(&self, text: &str) -> String {
        prefix_lines(&format!("{}\n", text), "// ")
    }

    fn order_of(&self, order: Order) -> f64 {
        match order {
            Order::Atomic => ORDER_ATOMIC,
            Order::Collection => ORDER_MEMBER,
            Order::None => ORDER_NONE,
        }
    }

    fn thunk(&self, body: &str) -> String {
        format!("() => {}", body)
    }

    fn to_string_call(&self, expr: &str) -> String {
        format!("String({})", expr)
    }

    fn stop_call(&self, message_expr: &str) -> String {
        format!("stopWithFail({})", message_expr)
    }

    fn json_pointer_call(&self, pointer_expr: &str) -> String {
        format!("jsonpointer.get(executor.current_source_json, {})", pointer_expr)
    }

    fn json_path_call(&self, path_expr: &str) -> String {
        format!("jsonpath.get(executor.current_source_json, {})", path_expr)
    }

    fn true_literal(&self) -> &'static str {
        "true"
    }

    fn false_literal(&self) -> &'static str {
        "false"
    }

    fn null_literal(&self) -> &'static str {
        "null"
    }

    fn design_open(&self) -> String {
        "EXECUTOR.addDesign(new RecordDesign()\n".to_string()
    }

    fn design_close(&self) -> String {
        ");\n".to_string()
    }

    fn backlink_prefix(&self) -> &'static str {
        "new BackwardLinkFor("
    }

    fn naked_value(&self, code: &str) -> String {
        format!("{};\n", code)
    }

    fn register_definitions(&self, definitions: &mut Definitions) {
        definitions.insert("executor", "const EXECUTOR = new Executor(INPUT_DOCUMENTS);");
    }

    fn finish(&self, code: &str, definitions: &Definitions) -> String {
        let defs: Vec<&str> = definitions.values().collect();
        format!("{}\n\n\n{}\nEXECUTOR.execute();\n", defs.join("\n\n"), code)
    }
}
