//! Store persisted as a single JSON object on local disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{KvError, KvReader, KvWriter};

/// A key-value store persisted as one JSON object of string values.
///
/// The whole map is loaded on open and rewritten on every `set`, so the file
/// on disk always reflects the last successful write. The file is created on
/// the first write if it does not exist yet.
#[derive(Debug)]
pub struct DiskKv {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl DiskKv {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, KvError> {
        let path = path.into();

        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| KvError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened disk store");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), KvError> {
        let text = serde_json::to_string(&self.entries).map_err(|source| KvError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        // Replace atomically: readers never observe a partial file.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvReader for DiskKv {
    fn get(&mut self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.entries.get(key).cloned())
    }
}

impl KvWriter for DiskKv {
    fn set(&mut self, key: &str, value: String) -> Result<(), KvError> {
        tracing::debug!(key, bytes = value.len(), "writing {}", self.path.display());
        let previous = self.entries.insert(key.to_string(), value);
        if let Err(e) = self.flush() {
            // Memory must not run ahead of the file.
            match previous {
                Some(previous) => self.entries.insert(key.to_string(), previous),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}
