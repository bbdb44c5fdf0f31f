//! Designer configuration.
//!
//! Every field has a default, so `{}` is a complete configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::backends::{JavascriptBackend, PythonBackend, DEFAULT_INDENT};
use crate::codegen::MappingBackend;
use crate::errors::{ConfigError, ErrorKind};
use crate::runtime::DEFAULT_TOLERABLE_ERRORS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    #[default]
    Python,
    Javascript,
}

impl TargetLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Javascript => "javascript",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "python" | "py" => Some(Self::Python),
            "javascript" | "js" => Some(Self::Javascript),
            _ => None,
        }
    }

    pub fn backend(&self, indent: usize) -> Box<dyn MappingBackend> {
        match self {
            Self::Python => Box::new(PythonBackend::new(indent)),
            Self::Javascript => Box::new(JavascriptBackend::new(indent)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    pub target: TargetLanguage,
    pub indent: usize,
    pub emit_block_comments: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            target: TargetLanguage::default(),
            indent: DEFAULT_INDENT,
            emit_block_comments: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeConfig {
    /// Error kinds that drop a single attribute value instead of aborting.
    pub tolerable_errors: Vec<ErrorKind>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tolerable_errors: DEFAULT_TOLERABLE_ERRORS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DesignerConfig {
    pub generator: GeneratorConfig,
    pub runtime: RuntimeConfig,
}

impl DesignerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }

    pub fn backend(&self) -> Box<dyn MappingBackend> {
        self.generator.target.backend(self.generator.indent)
    }
}
