//! Node bindings. JSON crosses the boundary as strings or `serde_json::Value`.

use napi_derive::napi;
use serde_json::Value;

use crate::config::DesignerConfig;
use crate::session::DesignerSession;

fn to_napi<E: std::fmt::Display>(context: &str) -> impl Fn(E) -> napi::Error + '_ {
    move |e| napi::Error::from_reason(format!("{}: {}", context, e))
}

fn parse_config(config_json: Option<String>) -> napi::Result<DesignerConfig> {
    match config_json {
        Some(json) => DesignerConfig::from_json_str(&json).map_err(to_napi("Config error")),
        None => Ok(DesignerConfig::default()),
    }
}

#[napi(js_name = "DesignerSession")]
pub struct JsDesignerSession {
    inner: DesignerSession,
}

#[napi]
impl JsDesignerSession {
    #[napi(constructor)]
    pub fn new(config_json: Option<String>) -> napi::Result<Self> {
        Ok(Self {
            inner: DesignerSession::new(parse_config(config_json)?),
        })
    }

    #[napi]
    pub fn process_document(&mut self, name: String, document: Value) -> String {
        self.inner.process_document(&name, &document)
    }

    #[napi]
    pub fn document_names(&self) -> Vec<String> {
        self.inner.document_names()
    }

    #[napi]
    pub fn flattened(&self) -> napi::Result<Value> {
        serde_json::to_value(self.inner.flattened()).map_err(to_napi("Serialize error"))
    }

    #[napi]
    pub fn unified_document(&self) -> napi::Result<Value> {
        serde_json::to_value(self.inner.unified_document()).map_err(to_napi("Serialize error"))
    }

    #[napi]
    pub fn reset(&mut self) {
        self.inner.reset();
    }

    #[napi]
    pub fn generate(&mut self, workspace: Value) -> napi::Result<Value> {
        let program = self
            .inner
            .generate(&workspace)
            .map_err(to_napi("Generation error"))?;
        serde_json::to_value(program).map_err(to_napi("Serialize error"))
    }

    #[napi]
    pub fn validate(&self, workspace: Value) -> napi::Result<Value> {
        let diagnostics = self
            .inner
            .validate(&workspace)
            .map_err(to_napi("Generation error"))?;
        serde_json::to_value(diagnostics).map_err(to_napi("Serialize error"))
    }

    #[napi]
    pub fn query_paths(&self, workspace: Value) -> napi::Result<Value> {
        let paths = self
            .inner
            .query_paths(&workspace)
            .map_err(to_napi("Generation error"))?;
        serde_json::to_value(paths).map_err(to_napi("Serialize error"))
    }

    /// Runs the designs over the registered documents.
    #[napi]
    pub fn execute(&self, workspace: Value) -> napi::Result<Value> {
        let graph = self
            .inner
            .execute_registered(&workspace)
            .map_err(to_napi("Execution error"))?;
        Ok(graph.to_json())
    }
}

/// Stateless generation for one workspace.
#[napi]
pub fn generate_program(workspace: Value, config_json: Option<String>) -> napi::Result<Value> {
    let mut session = DesignerSession::new(parse_config(config_json)?);
    let program = session
        .generate(&workspace)
        .map_err(to_napi("Generation error"))?;
    serde_json::to_value(program).map_err(to_napi("Serialize error"))
}

/// Stateless execution of one workspace over `documents`.
#[napi]
pub fn execute_designs(
    workspace: Value,
    documents: Vec<Value>,
    config_json: Option<String>,
) -> napi::Result<Value> {
    let session = DesignerSession::new(parse_config(config_json)?);
    let graph = session
        .execute(&workspace, &documents)
        .map_err(to_napi("Execution error"))?;
    Ok(graph.to_json())
}
