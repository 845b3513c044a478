//! Device-local key/value storage.
//!
//! A small string-to-string map persisted as one JSON file, written through
//! on every change. Values are themselves usually JSON (for example the
//! completed-days array).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

/// Key holding the JSON array of completed days.
pub const PROGRESS_KEY: &str = "bibleProgress";

/// Key holding the text size index.
pub const TEXT_SIZE_KEY: &str = "fontSizeIndex";

/// Storage file name in the data directory
const STORAGE_FILE: &str = "local_storage.json";

pub struct LocalStorage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl LocalStorage {
    /// Open the storage file in `dir`. A missing file is an empty store;
    /// an unreadable one is logged and replaced on the next write.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        let path = dir.join(STORAGE_FILE);

        let items = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Local storage is corrupt, starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, items })
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.items.insert(key.to_string(), value.into());
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.items)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut storage = LocalStorage::open(dir.path()).unwrap();
            storage.set_item(PROGRESS_KEY, "[1,2]").unwrap();
            storage.set_item(TEXT_SIZE_KEY, "3").unwrap();
            storage.set_item(TEXT_SIZE_KEY, "4").unwrap();
        }
        let storage = LocalStorage::open(dir.path()).unwrap();
        assert_eq!(storage.get_item(PROGRESS_KEY), Some("[1,2]"));
        assert_eq!(storage.get_item(TEXT_SIZE_KEY), Some("4"));
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORAGE_FILE), "{not json").unwrap();
        let storage = LocalStorage::open(dir.path()).unwrap();
        assert_eq!(storage.get_item(PROGRESS_KEY), None);
    }
}
