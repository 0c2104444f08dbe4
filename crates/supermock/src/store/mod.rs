//! Document store behind the rule registry.
//!
//! The registry keeps the whole hierarchy in a [`Database`] of three
//! [`Collection`]s. A [`Persistence`] backend decides where (and whether) a
//! database survives restarts:
//!
//! - [`MemoryPersistence`]: nothing is written, useful for tests and throwaway servers
//! - [`JsonFilePersistence`]: one pretty-printed JSON document on disk

mod file;
mod inmemory;

pub use file::JsonFilePersistence;
pub use inmemory::MemoryPersistence;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::registry::{Group, Rule, Space};

/// Something stored in a [`Collection`] under a string id.
pub trait Document {
    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

/// Insertion-ordered documents plus the id high-water mark.
///
/// Ids are decimal strings allocated from `last_id`, which only ever grows,
/// so an id is never handed out twice, even after the document is removed
/// and the database reloaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Collection<T> {
    #[serde(default)]
    last_id: u64,
    #[serde(default = "Vec::new")]
    docs: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            last_id: 0,
            docs: Vec::new(),
        }
    }
}

impl<T: Document + Clone> Collection<T> {
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.docs.iter().find(|d| d.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.docs.iter_mut().find(|d| d.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Assign the next id to `doc`, store it and return the stored copy.
    pub fn insert(&mut self, mut doc: T) -> T {
        self.last_id += 1;
        doc.set_id(self.last_id.to_string());
        self.docs.push(doc.clone());
        doc
    }

    /// Replace the document with the same id. Returns false if there is none.
    pub fn update(&mut self, doc: T) -> bool {
        match self.get_mut(doc.id()) {
            Some(slot) => {
                *slot = doc;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<T> {
        let pos = self.docs.iter().position(|d| d.id() == id)?;
        Some(self.docs.remove(pos))
    }

    pub fn find<P>(&self, predicate: P) -> Option<&T>
    where
        P: Fn(&T) -> bool,
    {
        self.docs.iter().find(|d| predicate(d))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.docs.iter()
    }

    /// Raise `last_id` above every numeric id present. Files written by hand
    /// may carry documents without a matching high-water mark.
    pub fn normalize(&mut self) {
        let max = self
            .docs
            .iter()
            .filter_map(|d| d.id().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        self.last_id = self.last_id.max(max);
    }
}

/// The three collections making up a registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Database {
    #[serde(default)]
    pub spaces: Collection<Space>,
    #[serde(default)]
    pub groups: Collection<Group>,
    #[serde(default)]
    pub rules: Collection<Rule>,
}

impl Database {
    pub fn normalize(&mut self) {
        self.spaces.normalize();
        self.groups.normalize();
        self.rules.normalize();
    }
}

/// Storage backend for a [`Database`].
pub trait Persistence: Send + Sync {
    /// Load the stored database, `None` when nothing was stored yet.
    fn load(&self) -> Result<Option<Database>, StoreError>;

    fn save(&self, db: &Database) -> Result<(), StoreError>;

    /// Short human-readable location, used in log lines.
    fn describe(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize database: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Check that `order` is an exact permutation of `current`.
///
/// Returns the new order, or `None` when an id is missing, unknown or
/// repeated. Callers leave their state untouched on `None`.
pub fn reorder(current: &[String], order: &[String]) -> Option<Vec<String>> {
    if current.len() != order.len() {
        return None;
    }
    let wanted: HashSet<&str> = current.iter().map(String::as_str).collect();
    let mut seen = HashSet::with_capacity(order.len());
    for id in order {
        if !wanted.contains(id.as_str()) || !seen.insert(id.as_str()) {
            return None;
        }
    }
    Some(order.to_vec())
}

/// Decode a JSON document, used by backends that store text.
pub(crate) fn decode<T: DeserializeOwned>(path: &std::path::Path, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
