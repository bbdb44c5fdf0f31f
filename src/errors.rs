//! Error types for the designer core.
//!
//! Each concern has its own enum; `DesignerError` wraps them for callers that
//! drive the whole pipeline (sessions, bindings).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Failure to parse a JSONPath or JSON Pointer string into path segments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("JSONPath '{path}' must start with '$'")]
    MissingRoot { path: String },

    #[error("JSON Pointer '{pointer}' must be empty or start with '/'")]
    MissingLeadingSlash { pointer: String },

    #[error("Unexpected '{found}' at offset {offset} in '{path}'")]
    UnexpectedChar {
        path: String,
        offset: usize,
        found: char,
    },

    #[error("Unterminated bracket in '{path}'")]
    UnterminatedBracket { path: String },

    #[error("Invalid escape '~{found}' in JSON Pointer '{pointer}'")]
    InvalidEscape { pointer: String, found: String },

    #[error("Wildcards are not allowed in a concrete path: '{path}'")]
    WildcardNotAllowed { path: String },
}

/// Failure to resolve a query against a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid query syntax: {0}")]
    Syntax(#[from] PathError),

    #[error("Nothing found at '{query}' (missing '{segment}')")]
    NotFound { query: String, segment: String },

    #[error("Cannot step into {found} with '{segment}' while resolving '{query}'")]
    TypeMismatch {
        query: String,
        segment: String,
        found: &'static str,
    },

    #[error("Query must be a string, got {found}")]
    NonStringQuery { found: &'static str },
}

/// Classification of evaluation failures. Used by the runtime to decide
/// whether a failed attribute value may be dropped or must abort the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    QuerySyntax,
    QueryNotFound,
    QueryTypeMismatch,
    Stopped,
    Failed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuerySyntax => "query-syntax",
            Self::QueryNotFound => "query-not-found",
            Self::QueryTypeMismatch => "query-type-mismatch",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

/// Failure raised by a single evaluator call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("Design stopped. {0}")]
    Stopped(String),

    #[error("{0}")]
    Failed(String),
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Query(QueryError::Syntax(_)) | Self::Query(QueryError::NonStringQuery { .. }) => {
                ErrorKind::QuerySyntax
            }
            Self::Query(QueryError::NotFound { .. }) => ErrorKind::QueryNotFound,
            Self::Query(QueryError::TypeMismatch { .. }) => ErrorKind::QueryTypeMismatch,
            Self::Stopped(_) => ErrorKind::Stopped,
            Self::Failed(_) => ErrorKind::Failed,
        }
    }
}

/// Fatal failure of a whole execution batch. No record graph is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Design '{design}' has no id evaluator")]
    MissingId { design: String },

    #[error("Design '{design}' failed to compute an id for document #{document}: {source}")]
    Id {
        design: String,
        document: usize,
        source: EvalError,
    },

    #[error("Design '{design}' produced an unusable id for document #{document}: {reason}")]
    InvalidId {
        design: String,
        document: usize,
        reason: String,
    },

    #[error("Design '{design}' failed to compute a pid for document #{document}: {source}")]
    Pid {
        design: String,
        document: usize,
        source: EvalError,
    },

    #[error("Design '{design}' failed to evaluate its skip condition for document #{document}: {source}")]
    SkipCondition {
        design: String,
        document: usize,
        source: EvalError,
    },

    #[error("Design '{design}' failed on attribute '{key}' for document #{document}: {source}")]
    Attribute {
        design: String,
        key: String,
        document: usize,
        source: EvalError,
    },
}

/// Structural failure while turning a block graph into code or designs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("Malformed block graph: {0}")]
    MalformedGraph(String),

    #[error("Block '{block_id}' has unknown type '{block_type}'")]
    UnknownBlockType {
        block_id: String,
        block_type: String,
    },

    #[error("Block '{block_id}' implements the profile contract incompletely: {missing}")]
    IncompleteProfile { block_id: String, missing: String },

    #[error("Block '{block_id}' must evaluate to a static string: {reason}")]
    NonStaticKey { block_id: String, reason: String },
}

/// Failure to load input documents.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Expected a JSON file, got: {}", .0.display())]
    NotJson(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

/// Failure to load configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error for callers driving the full pipeline.
#[derive(Debug, thiserror::Error)]
pub enum DesignerError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DesignerResult<T> = Result<T, DesignerError>;
