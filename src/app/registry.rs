//! The namespace registry.
//!
//! [`StateRegistry`] owns every namespace's state cell and action registry,
//! together with the shared [`EventBus`] and the default persistence store.
//! It is constructed once at application start and passed by reference to
//! whatever needs state; dropping it is the only teardown. Namespaces are
//! never removed while it lives.
//!
//! Creating a container for a namespace the registry already knows reuses the
//! stored state and action registry verbatim: no persisted load happens the
//! second time, and the new handle sees everything earlier handles did.

use crate::app::actions::ActionRegistry;
use crate::app::state::{StateConfig, StateContainer};
use crate::bus::EventBus;
use crate::domain::{Namespace, Result, StateError, StateShape};
use crate::infrastructure::sync::{lock, WriterGate};
use crate::storage::persistence::PersistenceTarget;
use crate::storage::{KeyValueStore, MemoryStore};
use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// State cell and action bookkeeping for one namespace.
pub(crate) struct NamespaceSlot<T> {
    pub(crate) state: Mutex<T>,
    pub(crate) writer: WriterGate,
    pub(crate) actions: Arc<ActionRegistry>,
}

impl<T> NamespaceSlot<T> {
    pub(crate) fn new(state: T) -> Self {
        Self {
            state: Mutex::new(state),
            writer: WriterGate::default(),
            actions: Arc::new(ActionRegistry::default()),
        }
    }
}

/// Type-erased registry entry.
struct SlotEntry {
    type_name: &'static str,
    actions: Arc<ActionRegistry>,
    slot: Arc<dyn Any + Send + Sync>,
}

/// Owner of all namespaces, the shared bus and the default store.
///
/// # Example
///
/// ```
/// use serde_json::{json, Map, Value};
/// use statebus::app::{StateConfig, StateRegistry};
///
/// let registry = StateRegistry::in_memory();
/// let initial: Map<String, Value> = json!({"count": 0}).as_object().cloned().unwrap();
///
/// let first = registry.create_state(StateConfig::new("counter", initial.clone()))?;
/// let second = registry.create_state(StateConfig::new("counter", initial))?;
///
/// first.set_state(json!({"count": 5}).as_object().cloned().unwrap());
/// assert_eq!(second.get_state()["count"], json!(5));
/// # Ok::<(), statebus::StateError>(())
/// ```
pub struct StateRegistry {
    bus: Arc<EventBus>,
    default_store: Arc<dyn KeyValueStore>,
    slots: Mutex<BTreeMap<Namespace, SlotEntry>>,
}

impl StateRegistry {
    /// Creates a registry publishing on `bus` and persisting to
    /// `default_store` unless a container configures its own store.
    #[must_use]
    pub fn new(bus: Arc<EventBus>, default_store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            bus,
            default_store,
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Registry with a fresh bus and an in-memory default store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(EventBus::new()), Arc::new(MemoryStore::new()))
    }

    /// The bus every container of this registry publishes on.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Store used when a container enables persistence without its own store.
    #[must_use]
    pub fn default_store(&self) -> &Arc<dyn KeyValueStore> {
        &self.default_store
    }

    /// Creates (or re-acquires) the container for `config.namespace`.
    ///
    /// On first creation the state is loaded from persistence when enabled,
    /// falling back to `initial_state` if nothing usable is stored. Later calls
    /// reuse the stored state; their own `initial_state`, persistence and
    /// middleware still apply to the handle they return.
    ///
    /// # Errors
    ///
    /// - [`StateError::Configuration`] if the namespace is empty or contains `:`
    /// - [`StateError::TypeMismatch`] if the namespace exists with another state type
    pub fn create_state<T: StateShape>(&self, config: StateConfig<T>) -> Result<StateContainer<T>> {
        let StateConfig {
            namespace,
            initial_state,
            persistence,
            middleware,
        } = config;

        let namespace = Namespace::new(namespace)?;
        let _span = tracing::debug_span!("create_state", namespace = %namespace).entered();

        let persistence = PersistenceTarget::resolve(&persistence, &namespace, &self.default_store);
        let slot = self.acquire_slot(&namespace, &initial_state, persistence.as_ref())?;

        Ok(StateContainer::assemble(
            namespace,
            initial_state,
            slot,
            persistence,
            Arc::clone(&self.bus),
            &middleware,
        ))
    }

    fn acquire_slot<T: StateShape>(
        &self,
        namespace: &Namespace,
        initial_state: &T,
        persistence: Option<&PersistenceTarget>,
    ) -> Result<Arc<NamespaceSlot<T>>> {
        let mut slots = lock(&self.slots);

        if let Some(entry) = slots.get(namespace) {
            tracing::debug!("reusing existing namespace");
            return Arc::clone(&entry.slot)
                .downcast::<NamespaceSlot<T>>()
                .map_err(|_| StateError::TypeMismatch {
                    namespace: namespace.to_string(),
                    existing: entry.type_name,
                    requested: type_name::<T>(),
                });
        }

        let state = persistence
            .and_then(PersistenceTarget::load::<T>)
            .unwrap_or_else(|| initial_state.clone());

        let slot = Arc::new(NamespaceSlot::new(state));
        slots.insert(
            namespace.clone(),
            SlotEntry {
                type_name: type_name::<T>(),
                actions: Arc::clone(&slot.actions),
                slot: Arc::clone(&slot) as Arc<dyn Any + Send + Sync>,
            },
        );

        tracing::debug!(namespaces = slots.len(), "namespace created");
        Ok(slot)
    }

    /// Known namespaces in sorted order.
    #[must_use]
    pub fn namespaces(&self) -> Vec<Namespace> {
        lock(&self.slots).keys().cloned().collect()
    }

    /// `true` if a container has been created for `namespace`.
    #[must_use]
    pub fn contains(&self, namespace: &str) -> bool {
        Namespace::new(namespace).is_ok_and(|ns| lock(&self.slots).contains_key(&ns))
    }

    /// Action registry of `namespace`, whatever its state type.
    #[must_use]
    pub fn actions(&self, namespace: &str) -> Option<Arc<ActionRegistry>> {
        let namespace = Namespace::new(namespace).ok()?;
        lock(&self.slots)
            .get(&namespace)
            .map(|entry| Arc::clone(&entry.actions))
    }
}

impl fmt::Debug for StateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRegistry")
            .field("namespaces", &self.namespaces())
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Map, Value};

    crate::partial_state! {
        #[derive(Debug, Clone, Serialize, Deserialize)]
        struct Flag => FlagPatch {
            on: bool,
        }
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn invalid_namespaces_fail_at_construction() {
        let registry = StateRegistry::in_memory();
        for bad in ["", "a:b"] {
            let err = registry
                .create_state(StateConfig::new(bad, obj(json!({}))))
                .unwrap_err();
            assert!(matches!(err, StateError::Configuration(_)), "{bad:?}");
        }
        assert!(registry.namespaces().is_empty());
    }

    #[test]
    fn reacquiring_with_another_type_is_rejected() {
        let registry = StateRegistry::in_memory();
        registry
            .create_state(StateConfig::new("shared", obj(json!({"a": 1}))))
            .unwrap();

        let err = registry
            .create_state(StateConfig::new("shared", Flag { on: false }))
            .unwrap_err();
        assert!(matches!(err, StateError::TypeMismatch { .. }));
    }

    #[test]
    fn reacquisition_shares_actions() {
        let registry = StateRegistry::in_memory();
        let first = registry
            .create_state(StateConfig::new("todo", obj(json!({"items": []}))))
            .unwrap();
        let _ = first.create_action("CLEAR", |_: &Map<String, Value>, _: &()| {
            obj(json!({"items": []}))
        });

        let second = registry
            .create_state(StateConfig::new("todo", obj(json!({}))))
            .unwrap();
        assert!(second.actions().contains("todo/CLEAR"));
        assert_eq!(registry.actions("todo").map(|a| a.len()), Some(1));
        assert!(registry.contains("todo"));
        assert!(!registry.contains("nope"));
    }
}
