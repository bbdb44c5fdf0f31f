//! A designer session: the unified schema of the loaded documents, the
//! configured generator and the generation cache, behind one handle.

use serde_json::Value;

use crate::blocks::BlockGraph;
use crate::cache::GenerationCache;
use crate::codegen::CodeGenerator;
use crate::config::DesignerConfig;
use crate::errors::{DesignerResult, GenerateError};
use crate::finalize::{finalize_program, GeneratedProgram};
use crate::inputs::InputDocument;
use crate::interpret::lower_graph;
use crate::runtime::{Executor, RecordGraph};
use crate::unifier::{FlattenedEntry, SchemaNode, Unifier};
use crate::validate::{collect_query_paths, validate_graph, Diagnostic, QueryUse};

pub struct DesignerSession {
    config: DesignerConfig,
    unifier: Unifier,
    cache: GenerationCache,
}

impl Default for DesignerSession {
    fn default() -> Self {
        Self::new(DesignerConfig::default())
    }
}

impl DesignerSession {
    pub fn new(config: DesignerConfig) -> Self {
        Self {
            config,
            unifier: Unifier::new(),
            cache: GenerationCache::new(),
        }
    }

    pub fn with_cache(mut self, cache: GenerationCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &DesignerConfig {
        &self.config
    }

    /// Replaces the configuration. Cached programs are keyed by generator
    /// options, so the cache stays valid.
    pub fn set_config(&mut self, config: DesignerConfig) {
        self.config = config;
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Documents
    // ───────────────────────────────────────────────────────────────────────────

    /// Registers a document and returns its (possibly disambiguated) name.
    pub fn process_document(&mut self, name: &str, document: &Value) -> String {
        self.unifier.process(name, document)
    }

    pub fn add_inputs(&mut self, documents: &[InputDocument]) -> Vec<String> {
        documents
            .iter()
            .map(|doc| self.unifier.process(&doc.name, &doc.content))
            .collect()
    }

    pub fn document_names(&self) -> Vec<String> {
        self.unifier.document_names()
    }

    pub fn document(&self, name: &str) -> Option<Value> {
        self.unifier.document(name)
    }

    pub fn unified_document(&self) -> SchemaNode {
        self.unifier.unified_document()
    }

    pub fn flattened(&self) -> Vec<FlattenedEntry> {
        self.unifier.flattened_entries()
    }

    pub fn reset(&mut self) {
        self.unifier.reset();
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Designs
    // ───────────────────────────────────────────────────────────────────────────

    pub fn validate(&self, workspace: &Value) -> Result<Vec<Diagnostic>, GenerateError> {
        Ok(validate_graph(&BlockGraph::from_json(workspace)?))
    }

    pub fn query_paths(&self, workspace: &Value) -> Result<Vec<QueryUse>, GenerateError> {
        Ok(collect_query_paths(&BlockGraph::from_json(workspace)?))
    }

    /// Generates the program for the configured target. Identical requests
    /// are served from the cache.
    pub fn generate(&mut self, workspace: &Value) -> Result<GeneratedProgram, GenerateError> {
        let options = &self.config.generator;
        let hash = GenerationCache::compute_hash(options, &workspace.to_string());
        if let Some(program) = self.cache.get(&hash) {
            tracing::debug!(hash = %hash, "generation cache hit");
            return Ok(program);
        }

        let graph = BlockGraph::from_json(workspace)?;
        let diagnostics = validate_graph(&graph);
        let backend = options.target.backend(options.indent);
        let code = CodeGenerator::new(backend.as_ref())
            .with_block_comments(options.emit_block_comments)
            .generate(&graph)?;

        let program = finalize_program(options.target, code, diagnostics);
        self.cache.set(hash, program.clone());
        Ok(program)
    }

    /// Runs the designs of `workspace` natively over `documents`.
    pub fn execute(&self, workspace: &Value, documents: &[Value]) -> DesignerResult<RecordGraph> {
        let graph = BlockGraph::from_json(workspace)?;
        let mut executor = Executor::new()
            .with_tolerable_errors(self.config.runtime.tolerable_errors.iter().copied());
        for design in lower_graph(&graph)? {
            executor.add_design(design);
        }
        Ok(executor.execute(documents)?)
    }

    /// Runs the designs over every registered document, in registration order.
    pub fn execute_registered(&self, workspace: &Value) -> DesignerResult<RecordGraph> {
        let documents: Vec<Value> = self
            .unifier
            .document_names()
            .iter()
            .filter_map(|name| self.unifier.document(name))
            .collect();
        self.execute(workspace, &documents)
    }
}
