mod error;
mod file;

pub use error::StorageError;
pub use file::FileArtifactStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Trait for artifact storage backends.
///
/// Artifacts are opaque bytes addressed by a `/`-separated key such as
/// `mappings/niem.json` or `graphs/run-1.json`.
pub trait ArtifactStore {
    /// Reads an artifact.
    fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Writes an artifact, replacing any previous content.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Lists keys under a prefix, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Whether an artifact exists.
    fn exists(&self, key: &str) -> bool;

    /// Writes a value as pretty JSON.
    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError>
    where
        Self: Sized,
    {
        let json = serde_json::to_vec_pretty(value)?;
        self.write(key, &json)
    }

    /// Reads a JSON artifact.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError>
    where
        Self: Sized,
    {
        let bytes = self.read(key)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
