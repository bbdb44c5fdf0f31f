use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::config::GeneratorConfig;
use crate::finalize::GeneratedProgram;

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub program: GeneratedProgram,
}

/// Memoizes generated programs by a content hash of the generator options
/// and the block graph. Optionally mirrored to a directory.
#[derive(Default)]
pub struct GenerationCache {
    entries: HashMap<String, GeneratedProgram>,
    cache_dir: Option<PathBuf>,
}

impl GenerationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persistent(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            if let Err(e) = fs::create_dir_all(&cache_dir) {
                tracing::warn!(dir = %cache_dir.display(), "cannot create cache directory: {}", e);
            }
        }
        Self {
            entries: HashMap::new(),
            cache_dir: Some(cache_dir),
        }
    }

    pub fn compute_hash(options: &GeneratorConfig, graph_json: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(options.target.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(options.indent.to_le_bytes());
        hasher.update([options.emit_block_comments as u8]);
        hasher.update(graph_json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, hash: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", hash)))
    }

    pub fn get(&mut self, hash: &str) -> Option<GeneratedProgram> {
        if let Some(program) = self.entries.get(hash) {
            return Some(program.clone());
        }

        let path = self.entry_path(hash)?;
        let data = fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %path.display(), "dropping corrupt cache entry: {}", e);
                fs::remove_file(&path).ok();
                return None;
            }
        };
        if entry.hash != hash {
            return None;
        }
        self.entries.insert(entry.hash, entry.program.clone());
        Some(entry.program)
    }

    pub fn set(&mut self, hash: String, program: GeneratedProgram) {
        if let Some(path) = self.entry_path(&hash) {
            let entry = CacheEntry {
                hash: hash.clone(),
                program: program.clone(),
            };
            if let Ok(data) = serde_json::to_string(&entry) {
                fs::write(path, data).ok();
            }
        }
        self.entries.insert(hash, program);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
