//! Key/value persistence capability.
//!
//! Values are plain strings; callers decide the encoding. Multi-key writes
//! and removals are atomic so related keys are never observed half-written.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{DatabaseError, Result};

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write all entries in one atomic step.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Remove all keys in one atomic step. Missing keys are ignored.
    fn remove_many(&self, keys: &[&str]) -> Result<()>;

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_many(&[key])
    }
}

/// Process-local store, used in tests and when no database can be opened.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let map = self.map.lock().map_err(|_| DatabaseError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut map = self.map.lock().map_err(|_| DatabaseError::Poisoned)?;
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut map = self.map.lock().map_err(|_| DatabaseError::Poisoned)?;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get("a").unwrap().is_none());
        store.set_many(&[("a", "1"), ("b", "2")]).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.len(), 2);
        store.remove_many(&["a", "b", "missing"]).unwrap();
        assert!(store.is_empty());
    }
}
