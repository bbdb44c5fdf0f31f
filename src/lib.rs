//! # Designer Native
//!
//! Core of a visual mapping designer: users combine blocks into record
//! designs describing how JSON documents turn into identifier records.
//!
//! ## Pipeline
//!
//! 1. **Unify**: input documents merge into one schema tree that counts how
//!    often each path and each scalar value was observed.
//! 2. **Design**: a Blockly workspace parses into a typed [`BlockGraph`].
//! 3. **Generate**: a [`MappingBackend`] turns the graph into a Python or
//!    JavaScript program for an external interpreter.
//! 4. **Execute**: alternatively the graph is lowered into native
//!    [`RecordDesign`]s and run by the [`Executor`].
//!
//! ## Invariants
//!
//! 1. **Path identity**: object key `"0"` and array index `0` are distinct
//!    path segments everywhere (unifier, pointers, JSONPath).
//! 2. **Deterministic output**: generated code depends only on the graph and
//!    the generator options. Definitions appear in first-registration order.
//! 3. **Atomic batches**: an execution either returns the full record graph
//!    or a single fatal error. Partial graphs are never returned.
//! 4. **Lazy values**: every attribute value is a thunk evaluated once per
//!    (design, document) pair. Attribute keys are static.
//! 5. **Single inference pass**: backlinks are inferred once, after all
//!    designs ran, and inferred tuples never trigger further rules.

pub mod backends;
pub mod blocks;
pub mod cache;
pub mod codegen;
pub mod config;
pub mod errors;
pub mod finalize;
pub mod inputs;
pub mod interpret;
pub mod path;
pub mod query;
pub mod runtime;
pub mod session;
pub mod unifier;
pub mod validate;
pub mod visitor;

#[cfg(feature = "napi")]
mod bindings;

#[cfg(test)]
mod property_tests;

pub use backends::{JavascriptBackend, PythonBackend};
pub use blocks::{Block, BlockGraph, BlockType};
pub use codegen::{generate, CodeGenerator, MappingBackend};
pub use config::{DesignerConfig, GeneratorConfig, RuntimeConfig, TargetLanguage};
pub use errors::{
    DesignerError, DesignerResult, ErrorKind, EvalError, GenerateError, PathError, QueryError,
    RuntimeError,
};
pub use finalize::GeneratedProgram;
pub use interpret::lower_graph;
pub use path::{parse_path, parse_pointer, to_path, to_pointer, PathSegment};
pub use runtime::{Executor, PidRecord, RecordDesign, RecordGraph};
pub use session::DesignerSession;
pub use unifier::{FlattenedEntry, SchemaNode, Unifier};
pub use validate::{validate_graph, Diagnostic};
