//! In-memory key/value store.

use crate::domain::error::Result;
use crate::infrastructure::sync::lock;
use crate::storage::backend::KeyValueStore;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local [`KeyValueStore`].
///
/// Nothing survives the process; sharing one instance between two registries
/// simulates a reload.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// `true` if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        tracing::trace!(key = %key, bytes = value.len(), "memory store write");
        Ok(())
    }
}
