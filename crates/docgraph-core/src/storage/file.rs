use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::StorageConfig;

use super::error::StorageError;
use super::ArtifactStore;

/// File-based artifact store.
///
/// Keys map to paths under the root directory:
/// ```text
/// .docgraph/
///   mappings/{name}.json          # Generated descriptors
///   graphs/{name}.json            # Converted graphs
///   graphs/{name}.cypher          # Emitted statements
/// ```
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a store rooted at the configured data directory.
    pub fn with_config(config: &StorageConfig) -> Self {
        Self::new(config.data_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to a path, refusing keys that leave the root.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn collect(&self, dir: &Path, keys: &mut Vec<String>) -> Result<(), StorageError> {
        let entries = fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                self.collect(&path, keys)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let key: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                keys.push(key.join("/"));
            }
        }
        Ok(())
    }
}

impl ArtifactStore for FileArtifactStore {
    fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        fs::read(&path).map_err(|e| StorageError::io(&path, e))
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
            }
        }
        fs::write(&path, bytes).map_err(|e| StorageError::io(&path, e))?;
        tracing::debug!(key, bytes = bytes.len(), "artifact written");
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        self.collect(&self.root, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.is_file()).unwrap_or(false)
    }
}
