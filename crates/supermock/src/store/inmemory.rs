use super::{Database, Persistence, StoreError};

/// Persistence that keeps nothing.
///
/// The registry already holds the live database, so an in-memory server has
/// nothing to write. `load` always starts from an empty database.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryPersistence;

impl MemoryPersistence {
    pub fn new() -> Self {
        Self
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<Option<Database>, StoreError> {
        Ok(None)
    }

    fn save(&self, _db: &Database) -> Result<(), StoreError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_persistence_starts_empty() {
        let store = MemoryPersistence::new();
        assert!(store.load().unwrap().is_none());
        store.save(&Database::default()).unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
