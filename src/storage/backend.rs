//! Key/value store abstraction used for state persistence.
//!
//! The trait is deliberately tiny: state containers only ever read one string
//! by key when a namespace is first created, and write one string by key after
//! every update. Both operations may fail; callers treat failures as
//! non-fatal.

use crate::domain::error::Result;
use std::sync::Arc;

/// Abstraction over durable string storage.
///
/// Implementations use interior mutability so a single store can be shared as
/// `Arc<dyn KeyValueStore>` by many containers.
///
/// `set` is called after the new state is in place but before subscribers are
/// notified, on the writing thread and without the state lock held. A store
/// may read the container it persists.
///
/// # Implementations
///
/// - [`MemoryStore`](crate::storage::MemoryStore): process-local map
/// - [`JsonFileStore`](crate::storage::JsonFileStore): JSON file with atomic writes (default)
///
/// # Examples
///
/// ```
/// use statebus::storage::{KeyValueStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// store.set("state_counter", r#"{"count":1}"#)?;
/// assert_eq!(store.get("state_counter")?.as_deref(), Some(r#"{"count":1}"#));
/// assert_eq!(store.get("missing")?, None);
/// # Ok::<(), statebus::StateError>(())
/// ```
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, `Ok(None)` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}
