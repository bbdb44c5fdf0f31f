//! Input document discovery and loading.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::errors::InputError;

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Recursively finds all `.json` files below `dir`, sorted by path.
pub fn discover_documents(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, InputError> {
    let dir = dir.as_ref();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|source| InputError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && is_json(path) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    tracing::debug!(dir = %dir.display(), found = files.len(), "discovered input documents");
    Ok(files)
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════════

/// A loaded document together with its display name.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDocument {
    pub name: String,
    pub path: PathBuf,
    pub content: Value,
}

fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

pub fn load_document(path: impl AsRef<Path>) -> Result<InputDocument, InputError> {
    let path = path.as_ref();
    if !is_json(path) {
        return Err(InputError::NotJson(path.to_path_buf()));
    }
    let data = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let content = serde_json::from_str(&data).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(InputDocument {
        name: document_name(path),
        path: path.to_path_buf(),
        content,
    })
}

/// Loads every path in order. The first failure aborts.
pub fn load_documents<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<InputDocument>, InputError> {
    paths.iter().map(load_document).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_discover_is_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.json", "{}");
        write(dir.path(), "nested/a.json", "{}");
        write(dir.path(), "a.JSON", "{}");
        write(dir.path(), "notes.txt", "x");

        let found = discover_documents(dir.path()).unwrap();
        let relative: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(relative, vec!["a.JSON", "b.json", "nested/a.json"]);
    }

    #[test]
    fn test_load_documents() {
        let dir = TempDir::new().unwrap();
        let first = write(dir.path(), "first.json", r#"{"id": 1}"#);
        let second = write(dir.path(), "second.json", r#"[1, 2]"#);

        let documents = load_documents(&[first, second]).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].name, "first");
        assert_eq!(documents[0].content, json!({"id": 1}));
        assert_eq!(documents[1].content, json!([1, 2]));
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let dir = TempDir::new().unwrap();
        let broken = write(dir.path(), "broken.json", "{not json");
        let text = write(dir.path(), "notes.txt", "{}");

        let err = load_document(&broken).unwrap_err();
        assert!(matches!(err, InputError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));

        assert!(matches!(load_document(&text), Err(InputError::NotJson(_))));
        assert!(matches!(
            load_document(dir.path().join("missing.json")),
            Err(InputError::Io { .. })
        ));
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            discover_documents("/nonexistent/input/dir"),
            Err(InputError::Walk { .. })
        ));
    }
}
