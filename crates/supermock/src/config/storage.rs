//! Where the rule registry is persisted.

use crate::store::{JsonFilePersistence, MemoryPersistence, Persistence};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// JSON database file, required for the `file` backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::File,
            path: Some(path.into()),
        }
    }

    /// Build the configured backend. A file backend without a path falls
    /// back to memory; `Config::validate` rejects that combination earlier.
    pub fn open(&self) -> Box<dyn Persistence> {
        match (self.backend, &self.path) {
            (StorageBackend::File, Some(path)) => Box::new(JsonFilePersistence::new(path)),
            _ => Box::new(MemoryPersistence::new()),
        }
    }
}
