//! Final packaging of a generated program.
//!
//! JavaScript output is syntax checked with oxc before it is handed to the
//! sandbox. There is no in-process Python parser; Python output is passed
//! through unchecked.

use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;
use serde::{Deserialize, Serialize};

use crate::config::TargetLanguage;
use crate::validate::Diagnostic;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedProgram {
    pub target: TargetLanguage,
    pub code: String,
    pub has_errors: bool,
    pub errors: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse errors of a JavaScript program, empty when it is well formed.
pub fn verify_javascript(code: &str) -> Vec<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, code, source_type).parse();
    ret.errors.iter().map(|e| e.to_string()).collect()
}

pub fn finalize_program(
    target: TargetLanguage,
    code: String,
    diagnostics: Vec<Diagnostic>,
) -> GeneratedProgram {
    let errors = match target {
        TargetLanguage::Javascript => verify_javascript(&code),
        TargetLanguage::Python => Vec::new(),
    };
    if !errors.is_empty() {
        tracing::warn!(target = target.as_str(), errors = errors.len(), "generated program does not parse");
    }
    GeneratedProgram {
        target,
        has_errors: !errors.is_empty(),
        errors,
        code,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_javascript() {
        let program = finalize_program(
            TargetLanguage::Javascript,
            "const EXECUTOR = new Executor(INPUT_DOCUMENTS);\nEXECUTOR.execute();\n".to_string(),
            vec![],
        );
        assert!(!program.has_errors, "{:?}", program.errors);
    }

    #[test]
    fn test_invalid_javascript_is_reported() {
        let program = finalize_program(
            TargetLanguage::Javascript,
            "EXECUTOR.addDesign(new RecordDesign()\n".to_string(),
            vec![],
        );
        assert!(program.has_errors);
        assert!(!program.errors.is_empty());
    }

    #[test]
    fn test_python_is_not_checked() {
        let program = finalize_program(TargetLanguage::Python, "def (".to_string(), vec![]);
        assert!(!program.has_errors);
    }
}
