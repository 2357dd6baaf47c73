//! JSON file-based key/value store.
//!
//! All entries live in one human-readable JSON document. Writes go to a
//! temporary file that is then renamed over the target, so a crash never
//! leaves a half-written store behind.
//!
//! # Performance Characteristics
//!
//! - **Read**: O(1), served from the in-memory copy loaded at open
//! - **Write**: O(n), serializes and rewrites the whole document
//! - **Best for**: a handful of namespaces with small state values

use crate::domain::error::{Result, StateError};
use crate::infrastructure::sync::lock;
use crate::storage::backend::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Top-level document written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    /// Format version for future migrations.
    version: u32,

    /// Stored values by key; values are opaque strings (serialized state).
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    document: StoreDocument,
    dirty: bool,
}

/// JSON file [`KeyValueStore`].
///
/// # File Format
///
/// ```json
/// {
///   "version": 1,
///   "entries": {
///     "state_counter": "{\"count\":7,\"last_updated\":\"2026-01-01T00:00:00Z\"}"
///   }
/// }
/// ```
#[derive(Debug)]
pub struct JsonFileStore {
    file_path: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonFileStore {
    /// Opens the store at `file_path`, creating parent directories as needed.
    ///
    /// A missing file starts an empty store; nothing is written until the
    /// first [`set`](KeyValueStore::set).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory creation fails
    /// - The file exists but cannot be read
    /// - The file exists but is not a valid store document
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use statebus::storage::JsonFileStore;
    ///
    /// let store = JsonFileStore::open("/tmp/statebus/state.json")?;
    /// # Ok::<(), statebus::StateError>(())
    /// ```
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();
        tracing::debug!(path = ?file_path, "opening JSON store");

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let document = if file_path.exists() {
            Self::load_from_file(&file_path)?
        } else {
            tracing::debug!("starting empty store");
            StoreDocument::default()
        };

        tracing::debug!(entries = document.entries.len(), "JSON store ready");

        Ok(Self {
            file_path,
            inner: Mutex::new(Inner {
                document,
                dirty: false,
            }),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Stored keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        lock(&self.inner).document.entries.keys().cloned().collect()
    }

    fn load_from_file(path: &Path) -> Result<StoreDocument> {
        let contents = std::fs::read_to_string(path)?;
        let document: StoreDocument = serde_json::from_str(&contents)
            .map_err(|e| StateError::Persistence(format!("failed to parse {}: {e}", path.display())))?;

        if document.version != FORMAT_VERSION {
            tracing::warn!(
                found = document.version,
                expected = FORMAT_VERSION,
                "store format version differs"
            );
        }
        Ok(document)
    }

    /// Writes the document if dirty: temp file first, then rename.
    fn flush(&self, inner: &mut Inner) -> Result<()> {
        if !inner.dirty {
            return Ok(());
        }

        let json = serde_json::to_string_pretty(&inner.document)?;
        let tmp_path = self.file_path.with_extension("tmp");

        tracing::trace!(tmp_path = ?tmp_path, "writing temporary file");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.file_path)?;

        inner.dirty = false;
        tracing::debug!(path = ?self.file_path, "store saved");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.inner).document.entries.get(key).cloned())
    }

    /// Stores `value` and writes the file.
    ///
    /// If the write fails the previous entry is put back, so the store never
    /// reports a value that was not saved.
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _span = tracing::debug_span!("json_store_set", key = %key).entered();

        let mut inner = lock(&self.inner);
        let was_dirty = inner.dirty;
        let previous = inner.document.entries.insert(key.to_string(), value.to_string());
        inner.dirty = true;

        let result = self.flush(&mut inner);
        if result.is_err() {
            match previous {
                Some(old) => inner.document.entries.insert(key.to_string(), old),
                None => inner.document.entries.remove(key),
            };
            inner.dirty = was_dirty;
        }
        result
    }
}

impl Drop for JsonFileStore {
    /// Retries a write that failed earlier, if any.
    fn drop(&mut self) {
        let mut inner = lock(&self.inner);
        if inner.dirty {
            tracing::debug!("saving dirty store on drop");
            if let Err(e) = self.flush(&mut inner) {
                tracing::error!(error = %e, "failed to save store on drop");
            }
        }
    }
}
