use super::{decode, Database, Persistence, StoreError};
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores the database as a single pretty-printed JSON file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves the previous version intact. A save whose content
/// equals the last write is skipped.
pub struct JsonFilePersistence {
    path: PathBuf,
    last_written: Mutex<Option<String>>,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl Persistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<Database>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let mut db: Database = decode(&self.path, &raw)?;
        db.normalize();
        *self.last_written.lock() = Some(raw);
        Ok(Some(db))
    }

    fn save(&self, db: &Database) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(db)?;

        let mut last = self.last_written.lock();
        if last.as_deref() == Some(content.as_str()) {
            debug!("Database unchanged, skipping write to {}", self.path.display());
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_err(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &content).map_err(|e| self.write_err(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.write_err(e))?;

        *last = Some(content);
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
