//! Volatile in-process store.

use std::collections::BTreeMap;

use crate::{KvError, KvReader, KvWriter};

/// A key-value store that lives only as long as the process.
///
/// # Example
///
/// ```rust
/// use hostlink_kv::{KvReader, KvWriter, MemoryKv};
///
/// let mut store = MemoryKv::new();
/// store.set("/save.dat", "AAEC".to_string()).unwrap();
/// assert_eq!(store.get("/save.dat").unwrap().as_deref(), Some("AAEC"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryKv {
    entries: BTreeMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with initial entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvReader for MemoryKv {
    fn get(&mut self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.entries.get(key).cloned())
    }
}

impl KvWriter for MemoryKv {
    fn set(&mut self, key: &str, value: String) -> Result<(), KvError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces() {
        let mut store = MemoryKv::new();
        store.set("k", "a".to_string()).unwrap();
        store.set("k", "b".to_string()).unwrap();

        assert_eq!(store.get("k").unwrap().as_deref(), Some("b"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn seeded_entries_are_visible() {
        let mut store = MemoryKv::with_entries([("/a", "YQ=="), ("/b", "Yg==")]);

        assert_eq!(store.get("/b").unwrap().as_deref(), Some("Yg=="));
        assert_eq!(store.get("/c").unwrap(), None);
        assert!(!store.is_empty());
    }
}
