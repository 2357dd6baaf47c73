//! Actions, action creators and the per-namespace action registry.
//!
//! An [`Action`] is a named request to transition state. It carries its own
//! reducer, so dispatch never needs to look anything up: the
//! [`ActionRegistry`] is bookkeeping for introspection and debugging only.
//!
//! # Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use statebus::app::{StateConfig, StateRegistry};
//!
//! statebus::partial_state! {
//!     #[derive(Debug, Clone, Serialize, Deserialize)]
//!     pub struct User => UserPatch {
//!         pub name: String,
//!         pub age: u32,
//!     }
//! }
//!
//! let registry = StateRegistry::in_memory();
//! let user = registry.create_state(StateConfig::new(
//!     "user",
//!     User { name: String::new(), age: 0 },
//! ))?;
//!
//! let rename = user.create_action("UPDATE_NAME", |_state: &User, name: &String| {
//!     UserPatch::default().name(name.clone())
//! });
//! rename.create("John".to_string());
//!
//! assert_eq!(rename.action_type(), "user/UPDATE_NAME");
//! assert_eq!(user.get_state().name, "John");
//! # Ok::<(), statebus::StateError>(())
//! ```

use crate::app::middleware::Dispatch;
use crate::domain::StateShape;
use crate::infrastructure::sync::lock;
use chrono::{DateTime, Utc};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;
use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Reducer with a typed payload: `(state, payload) -> partial update`.
pub type Reducer<T, P> = Arc<dyn Fn(&T, &P) -> <T as StateShape>::Partial + Send + Sync>;

type BoundReducer<T> = Arc<dyn Fn(&T) -> <T as StateShape>::Partial + Send + Sync>;

/// A reducer-carrying request to transition state.
///
/// The payload (if any) is bound into the reducer and also kept type-erased so
/// middleware can inspect it with [`payload`](Self::payload).
pub struct Action<T: StateShape> {
    action_type: String,
    payload: Option<Arc<dyn Any + Send + Sync>>,
    reducer: BoundReducer<T>,
}

impl<T: StateShape> Action<T> {
    /// Creates an action with a payload.
    pub fn new<P, R>(action_type: impl Into<String>, payload: P, reducer: R) -> Self
    where
        P: Send + Sync + 'static,
        R: Fn(&T, &P) -> T::Partial + Send + Sync + 'static,
    {
        let payload = Arc::new(payload);
        let bound = Arc::clone(&payload);
        let erased: Arc<dyn Any + Send + Sync> = payload;
        Self {
            action_type: action_type.into(),
            payload: Some(erased),
            reducer: Arc::new(move |state: &T| reducer(state, &bound)),
        }
    }

    /// Creates an action whose reducer needs no payload.
    pub fn without_payload<R>(action_type: impl Into<String>, reducer: R) -> Self
    where
        R: Fn(&T) -> T::Partial + Send + Sync + 'static,
    {
        Self {
            action_type: action_type.into(),
            payload: None,
            reducer: Arc::new(reducer),
        }
    }

    /// The action type, namespace-qualified when built by an [`ActionCreator`].
    #[must_use]
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// The payload, if present and of type `P`.
    #[must_use]
    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.payload.as_deref()?.downcast_ref::<P>()
    }

    /// `true` if the action was built with a payload.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Runs the reducer against `state`.
    #[must_use]
    pub fn reduce(&self, state: &T) -> T::Partial {
        (self.reducer)(state)
    }
}

impl<T: StateShape> Clone for Action<T> {
    fn clone(&self) -> Self {
        Self {
            action_type: self.action_type.clone(),
            payload: self.payload.clone(),
            reducer: Arc::clone(&self.reducer),
        }
    }
}

impl<T: StateShape> fmt::Debug for Action<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("action_type", &self.action_type)
            .field("has_payload", &self.has_payload())
            .finish_non_exhaustive()
    }
}

/// Handle returned by `create_action`; builds and dispatches actions of one type.
pub struct ActionCreator<T: StateShape, P> {
    action_type: String,
    reducer: Reducer<T, P>,
    dispatch: Dispatch<T>,
}

impl<T: StateShape, P: Send + Sync + 'static> ActionCreator<T, P> {
    pub(crate) fn new(action_type: String, reducer: Reducer<T, P>, dispatch: Dispatch<T>) -> Self {
        Self {
            action_type,
            reducer,
            dispatch,
        }
    }

    /// Fully-qualified action type, `"{namespace}/{raw}"`.
    #[must_use]
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// The reducer this creator was registered with.
    #[must_use]
    pub fn reducer(&self) -> &Reducer<T, P> {
        &self.reducer
    }

    /// Builds an action without dispatching it.
    #[must_use]
    pub fn build(&self, payload: P) -> Action<T> {
        let reducer = Arc::clone(&self.reducer);
        Action::new(self.action_type.clone(), payload, move |state: &T, payload: &P| {
            reducer(state, payload)
        })
    }

    /// Dispatches an action with `payload` through the container's middleware chain.
    pub fn create(&self, payload: P) {
        (self.dispatch)(self.build(payload));
    }
}

impl<T: StateShape, P> Clone for ActionCreator<T, P> {
    fn clone(&self) -> Self {
        Self {
            action_type: self.action_type.clone(),
            reducer: Arc::clone(&self.reducer),
            dispatch: Arc::clone(&self.dispatch),
        }
    }
}

impl<T: StateShape, P> fmt::Debug for ActionCreator<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCreator")
            .field("action_type", &self.action_type)
            .finish_non_exhaustive()
    }
}

/// One registration in an [`ActionRegistry`]: the action type and its reducer.
#[derive(Debug, Clone, Serialize)]
pub struct ActionEntry {
    /// Fully-qualified action type.
    pub action_type: String,

    /// Rust type name of the payload the reducer accepts.
    pub payload_type: &'static str,

    /// When the action was (last) registered.
    pub registered_at: DateTime<Utc>,

    /// The registered [`Reducer`], type-erased.
    #[serde(skip)]
    reducer: Arc<dyn Any + Send + Sync>,
}

impl ActionEntry {
    fn new<T: StateShape, P: Send + Sync + 'static>(action_type: String, reducer: &Reducer<T, P>) -> Self {
        Self {
            action_type,
            payload_type: type_name::<P>(),
            registered_at: Utc::now(),
            reducer: Arc::new(Arc::clone(reducer)),
        }
    }

    /// The registered reducer, if it has state type `T` and payload type `P`.
    #[must_use]
    pub fn reducer<T: StateShape, P: Send + Sync + 'static>(&self) -> Option<Reducer<T, P>> {
        self.reducer.downcast_ref::<Reducer<T, P>>().cloned()
    }
}

/// Per-namespace map from qualified action type to its registration.
///
/// Registration always overwrites an existing entry with the same type.
/// Dispatch never goes through here; reducers are kept for introspection.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    entries: Mutex<BTreeMap<String, ActionEntry>>,
}

impl ActionRegistry {
    pub(crate) fn register<T, P>(&self, action_type: &str, reducer: &Reducer<T, P>)
    where
        T: StateShape,
        P: Send + Sync + 'static,
    {
        let entry = ActionEntry::new(action_type.to_string(), reducer);
        let previous = lock(&self.entries).insert(action_type.to_string(), entry);
        tracing::debug!(
            action_type = %action_type,
            replaced = previous.is_some(),
            "action registered"
        );
    }

    /// All registrations, sorted by action type.
    #[must_use]
    pub fn entries(&self) -> Vec<ActionEntry> {
        lock(&self.entries).values().cloned().collect()
    }

    /// Registration for `action_type`, if any.
    #[must_use]
    pub fn get(&self, action_type: &str) -> Option<ActionEntry> {
        lock(&self.entries).get(action_type).cloned()
    }

    /// `true` if `action_type` has been registered.
    #[must_use]
    pub fn contains(&self, action_type: &str) -> bool {
        lock(&self.entries).contains_key(action_type)
    }

    /// Number of registered action types.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Fuzzy-searches registered action types, best match first.
    ///
    /// An empty query returns every entry in type order.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<ActionEntry> {
        let entries = self.entries();
        if query.trim().is_empty() {
            return entries;
        }

        let matcher = SkimMatcherV2::default().ignore_case();
        let mut scored: Vec<(i64, ActionEntry)> = entries
            .into_iter()
            .filter_map(|entry| {
                matcher
                    .fuzzy_match(&entry.action_type, query)
                    .map(|score| (score, entry))
            })
            .collect();
        scored.sort_by(|(a, ea), (b, eb)| b.cmp(a).then_with(|| ea.action_type.cmp(&eb.action_type)));
        scored.into_iter().map(|(_, entry)| entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    crate::partial_state! {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Tally => TallyPatch {
            total: i64,
        }
    }

    #[test]
    fn action_payload_is_inspectable_and_bound_into_reducer() {
        let action: Action<Tally> = Action::new("tally/ADD", 5_i64, |state: &Tally, amount: &i64| {
            TallyPatch::default().total(state.total + amount)
        });

        assert_eq!(action.payload::<i64>(), Some(&5));
        assert_eq!(action.payload::<String>(), None);

        let mut state = Tally { total: 1 };
        state.merge(action.reduce(&state));
        assert_eq!(state.total, 6);
    }

    #[test]
    fn payloadless_action() {
        let action: Action<Tally> =
            Action::without_payload("tally/CLEAR", |_: &Tally| TallyPatch::default().total(0));
        assert!(!action.has_payload());
        assert_eq!(action.action_type(), "tally/CLEAR");
    }

    fn noop<P: Send + Sync + 'static>() -> Reducer<Tally, P> {
        Arc::new(|_: &Tally, _: &P| TallyPatch::default())
    }

    #[test]
    fn registry_overwrites_by_type() {
        let registry = ActionRegistry::default();
        registry.register("tally/RESET", &noop::<()>());
        registry.register("tally/RESET", &noop::<i64>());

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("tally/RESET").unwrap().payload_type, "i64");
    }

    #[test]
    fn entry_keeps_a_callable_reducer() {
        let registry = ActionRegistry::default();
        let add: Reducer<Tally, i64> =
            Arc::new(|state: &Tally, amount: &i64| TallyPatch::default().total(state.total + amount));
        registry.register("tally/ADD", &add);

        let entry = registry.get("tally/ADD").unwrap();
        assert!(entry.reducer::<Tally, String>().is_none());

        let reducer = entry.reducer::<Tally, i64>().unwrap();
        let mut state = Tally { total: 2 };
        state.merge(reducer(&state, &3));
        assert_eq!(state.total, 5);
    }

    #[test]
    fn search_ranks_matching_types() {
        let registry = ActionRegistry::default();
        registry.register("counter/INCREMENT", &noop::<()>());
        registry.register("counter/RESET", &noop::<()>());
        registry.register("counter/ADD", &noop::<i64>());

        let found: Vec<String> = registry
            .search("incr")
            .into_iter()
            .map(|e| e.action_type)
            .collect();
        assert_eq!(found, vec!["counter/INCREMENT".to_string()]);
        assert_eq!(registry.search("").len(), 3);
    }
}
