//! Persistence configuration and the best-effort load/save path.
//!
//! [`Persistence`] is what callers configure per container. At construction it
//! resolves into a `PersistenceTarget` (effective key + effective store), which
//! is the only code that talks to a [`KeyValueStore`] on behalf of a
//! container. Every failure here is logged and swallowed: a broken store
//! degrades the container to non-persisted operation and never affects the
//! in-memory update or its notification.

use crate::domain::error::{Result, StateError};
use crate::domain::Namespace;
use crate::storage::backend::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Per-container persistence settings.
///
/// # Example
///
/// ```
/// use statebus::storage::{MemoryStore, Persistence};
/// use std::sync::Arc;
///
/// let persistence = Persistence::enabled()
///     .with_key("custom_storage_key")
///     .with_store(Arc::new(MemoryStore::new()));
/// assert!(persistence.enabled);
/// ```
#[derive(Clone, Default)]
pub struct Persistence {
    /// Whether state is loaded from and saved to a store.
    pub enabled: bool,

    /// Storage key; defaults to `"state_{namespace}"`.
    pub key: Option<String>,

    /// Store to use; defaults to the registry's default store.
    pub store: Option<Arc<dyn KeyValueStore>>,
}

impl Persistence {
    /// Persistence turned off (the default).
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Persistence turned on with the default key and store.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Overrides the storage key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Overrides the store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistence")
            .field("enabled", &self.enabled)
            .field("key", &self.key)
            .field("custom_store", &self.store.is_some())
            .finish()
    }
}

/// Resolved persistence for one container.
#[derive(Clone)]
pub(crate) struct PersistenceTarget {
    namespace: Namespace,
    key: String,
    store: Arc<dyn KeyValueStore>,
}

impl PersistenceTarget {
    /// Resolves the effective key and store; `None` when persistence is off.
    pub(crate) fn resolve(
        config: &Persistence,
        namespace: &Namespace,
        default_store: &Arc<dyn KeyValueStore>,
    ) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let key = config
            .key
            .clone()
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| namespace.default_storage_key());
        let store = config
            .store
            .clone()
            .unwrap_or_else(|| Arc::clone(default_store));
        Some(Self {
            namespace: namespace.clone(),
            key,
            store,
        })
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Reads and parses the persisted state.
    ///
    /// `None` when the key is absent or the read/parse fails (logged).
    pub(crate) fn load<T: DeserializeOwned>(&self) -> Option<T> {
        match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(
                    namespace = %self.namespace,
                    key = %self.key,
                    error = %e,
                    "failed to load persisted state, using initial state"
                );
                None
            }
        }
    }

    /// Serializes and writes `state`; failures are logged only.
    pub(crate) fn save<T: Serialize>(&self, state: &T) {
        if let Err(e) = self.try_save(state) {
            tracing::error!(
                namespace = %self.namespace,
                key = %self.key,
                error = %e,
                "failed to persist state"
            );
        }
    }

    fn try_load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let Some(raw) = self.store.get(&self.key)? else {
            tracing::debug!(key = %self.key, "no persisted state");
            return Ok(None);
        };
        let state = serde_json::from_str(&raw).map_err(|e| {
            StateError::Persistence(format!("failed to parse persisted state for {}: {e}", self.namespace))
        })?;
        tracing::debug!(key = %self.key, "loaded persisted state");
        Ok(Some(state))
    }

    fn try_save<T: Serialize>(&self, state: &T) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.store.set(&self.key, &json)
    }
}

impl fmt::Debug for PersistenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceTarget")
            .field("namespace", &self.namespace)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn default_store() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryStore::new())
    }

    #[test]
    fn disabled_resolves_to_none() {
        let ns = Namespace::new("counter").unwrap();
        assert!(PersistenceTarget::resolve(&Persistence::disabled(), &ns, &default_store()).is_none());
    }

    #[test]
    fn key_defaults_to_namespace() {
        let ns = Namespace::new("counter").unwrap();
        let target = PersistenceTarget::resolve(&Persistence::enabled(), &ns, &default_store()).unwrap();
        assert_eq!(target.key(), "state_counter");

        let custom = Persistence::enabled().with_key("custom");
        let target = PersistenceTarget::resolve(&custom, &ns, &default_store()).unwrap();
        assert_eq!(target.key(), "custom");
    }

    #[test]
    fn unparseable_value_loads_as_none() {
        let ns = Namespace::new("counter").unwrap();
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set("state_counter", "{not json").unwrap();

        let target = PersistenceTarget::resolve(&Persistence::enabled(), &ns, &store).unwrap();
        assert_eq!(target.load::<u32>(), None);
    }

    #[test]
    fn save_then_load() {
        let ns = Namespace::new("counter").unwrap();
        let store = default_store();
        let target = PersistenceTarget::resolve(&Persistence::enabled(), &ns, &store).unwrap();

        target.save(&vec![1, 2, 3]);
        assert_eq!(target.load::<Vec<i32>>(), Some(vec![1, 2, 3]));
    }
}
