//! Per-namespace state containers.
//!
//! A [`StateContainer`] is a cheap, cloneable handle onto one namespace's state
//! cell. Every write goes through the same commit path, all of it inside the
//! namespace's writer gate:
//!
//! 1. merge (or replace) under the state lock, producing a new value
//! 2. release the state lock and persist the new value, best effort
//! 3. publish the new value on `"{namespace}:stateChange"`
//!
//! A dispatched action also reads the current state and runs its reducer
//! inside the gate, so concurrent writers to one namespace never interleave
//! and subscribers observe updates in commit order. The gate is re-entrant:
//! a subscriber, reducer or store running on the writing thread may read or
//! write the same container. Writers on other threads wait.
//!
//! Notification completes before the writing call returns.
//!
//! There are two write paths. `set_state` is the low-level primitive: it
//! bypasses actions and middleware. `dispatch` (and `ActionCreator::create`)
//! goes through the composed middleware chain, whose innermost link runs the
//! action's reducer and then commits like `set_state`.

use crate::app::actions::{Action, ActionCreator, ActionRegistry, Reducer};
use crate::app::middleware::{compose, Dispatch, Middleware, MiddlewareApi};
use crate::app::registry::NamespaceSlot;
use crate::bus::{EventBus, Subscription};
use crate::domain::{Namespace, StateShape};
use crate::infrastructure::sync::lock;
use crate::storage::persistence::PersistenceTarget;
use crate::storage::Persistence;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Configuration for creating a state container.
///
/// # Example
///
/// ```
/// use serde_json::{json, Map, Value};
/// use statebus::app::{LoggingMiddleware, StateConfig};
/// use statebus::storage::Persistence;
///
/// let initial: Map<String, Value> = json!({"name": "", "age": 0}).as_object().cloned().unwrap();
/// let config = StateConfig::new("user", initial)
///     .with_persistence(Persistence::enabled().with_key("user_state"))
///     .with_middleware(LoggingMiddleware);
/// assert_eq!(config.namespace, "user");
/// ```
pub struct StateConfig<T: StateShape> {
    /// Namespace key; must be non-empty and free of `:`.
    pub namespace: String,

    /// Value used on first creation (when nothing is persisted) and by `reset`.
    pub initial_state: T,

    /// Persistence settings; disabled by default.
    pub persistence: Persistence,

    /// Middleware in configuration order; the first entry runs outermost.
    pub middleware: Vec<Arc<dyn Middleware<T>>>,
}

impl<T: StateShape> StateConfig<T> {
    /// Configuration with persistence disabled and no middleware.
    pub fn new(namespace: impl Into<String>, initial_state: T) -> Self {
        Self {
            namespace: namespace.into(),
            initial_state,
            persistence: Persistence::disabled(),
            middleware: Vec::new(),
        }
    }

    /// Sets the persistence settings.
    #[must_use]
    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = persistence;
        self
    }

    /// Appends a middleware (it runs inside every middleware added before it).
    #[must_use]
    pub fn with_middleware(mut self, middleware: impl Middleware<T> + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared middleware.
    #[must_use]
    pub fn with_shared_middleware(mut self, middleware: Arc<dyn Middleware<T>>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

impl<T: StateShape> fmt::Debug for StateConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateConfig")
            .field("namespace", &self.namespace)
            .field("persistence", &self.persistence)
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

/// Everything the commit path needs, shared by the handle and its base dispatch.
struct Core<T: StateShape> {
    namespace: Namespace,
    change_event: String,
    initial_state: T,
    slot: Arc<NamespaceSlot<T>>,
    persistence: Option<PersistenceTarget>,
    bus: Arc<EventBus>,
}

impl<T: StateShape> Core<T> {
    fn commit(&self, update: impl FnOnce(&mut T)) {
        let _turn = self.slot.writer.enter();

        let snapshot = {
            let mut state = lock(&self.slot.state);
            update(&mut state);
            state.clone()
        };

        if let Some(persistence) = &self.persistence {
            persistence.save(&snapshot);
        }

        let delivered = self.bus.publish(&self.change_event, &snapshot);
        tracing::debug!(namespace = %self.namespace, delivered, "state committed");
    }

    fn apply(&self, action: &Action<T>) {
        let _turn = self.slot.writer.enter();
        let current = lock(&self.slot.state).clone();
        let partial = action.reduce(&current);
        self.commit(|state| state.merge(partial));
    }
}

/// Handle onto one namespace's state.
///
/// Clones share everything, including the composed dispatch chain.
pub struct StateContainer<T: StateShape> {
    core: Arc<Core<T>>,
    dispatch: Dispatch<T>,
    // Keeps the chain reachable for `MiddlewareApi::dispatch`, which only holds a weak reference.
    _chain: Arc<OnceLock<Dispatch<T>>>,
}

impl<T: StateShape> StateContainer<T> {
    pub(crate) fn assemble(
        namespace: Namespace,
        initial_state: T,
        slot: Arc<NamespaceSlot<T>>,
        persistence: Option<PersistenceTarget>,
        bus: Arc<EventBus>,
        middleware: &[Arc<dyn Middleware<T>>],
    ) -> Self {
        let core = Arc::new(Core {
            change_event: namespace.change_event(),
            namespace,
            initial_state,
            slot,
            persistence,
            bus,
        });

        let base_core = Arc::clone(&core);
        let base: Dispatch<T> = Arc::new(move |action: Action<T>| {
            let _span = tracing::debug_span!("reduce", action_type = %action.action_type()).entered();
            base_core.apply(&action);
        });

        let chain = Arc::new(OnceLock::new());
        let api = MiddlewareApi::new(Arc::clone(&core.slot), Arc::downgrade(&chain));
        let dispatch = compose(base, &api, middleware);
        let _ = chain.set(Arc::clone(&dispatch));

        tracing::debug!(
            namespace = %core.namespace,
            middleware = middleware.len(),
            persist_key = ?core.persistence.as_ref().map(PersistenceTarget::key),
            "state container ready"
        );

        Self {
            core,
            dispatch,
            _chain: chain,
        }
    }

    /// The namespace this container manages.
    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.core.namespace
    }

    /// Name of the event published after every update.
    #[must_use]
    pub fn change_event(&self) -> &str {
        &self.core.change_event
    }

    /// The value `reset` restores.
    #[must_use]
    pub fn initial_state(&self) -> &T {
        &self.core.initial_state
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn get_state(&self) -> T {
        lock(&self.core.slot.state).clone()
    }

    /// Shallow-merges `partial` onto the current state, persists, and notifies.
    ///
    /// Persistence failures are logged and otherwise ignored: the in-memory
    /// update and the notification happen regardless.
    pub fn set_state(&self, partial: T::Partial) {
        let _span = tracing::debug_span!("set_state", namespace = %self.core.namespace).entered();
        self.core.commit(|state| state.merge(partial));
    }

    /// Registers `callback` for every future update of this namespace.
    ///
    /// The callback is not invoked with the current state; call
    /// [`get_state`](Self::get_state) for the initial value.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.core.bus.subscribe(self.core.change_event.clone(), callback)
    }

    /// Overwrites every field with the initial state, then persists and
    /// notifies exactly like [`set_state`](Self::set_state).
    pub fn reset(&self) {
        let _span = tracing::debug_span!("reset", namespace = %self.core.namespace).entered();
        let initial = self.core.initial_state.clone();
        self.core.commit(move |state| *state = initial);
    }

    /// Registers `"{namespace}/{raw_type}"` and returns its creator.
    ///
    /// Registering the same type again silently replaces the earlier entry.
    pub fn create_action<P, R>(&self, raw_type: &str, reducer: R) -> ActionCreator<T, P>
    where
        P: Send + Sync + 'static,
        R: Fn(&T, &P) -> T::Partial + Send + Sync + 'static,
    {
        let action_type = self.core.namespace.qualify(raw_type);
        let reducer: Reducer<T, P> = Arc::new(reducer);
        self.core.slot.actions.register(&action_type, &reducer);
        ActionCreator::new(action_type, reducer, Arc::clone(&self.dispatch))
    }

    /// Sends `action` through the composed middleware chain.
    pub fn dispatch(&self, action: Action<T>) {
        (self.dispatch)(action);
    }

    /// Action bookkeeping for this namespace.
    #[must_use]
    pub fn actions(&self) -> Arc<ActionRegistry> {
        Arc::clone(&self.core.slot.actions)
    }
}

impl<T: StateShape> Clone for StateContainer<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            dispatch: Arc::clone(&self.dispatch),
            _chain: Arc::clone(&self._chain),
        }
    }
}

impl<T: StateShape> fmt::Debug for StateContainer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateContainer")
            .field("namespace", &self.core.namespace)
            .field("persistence", &self.core.persistence)
            .finish_non_exhaustive()
    }
}
