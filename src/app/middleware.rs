//! Middleware wrapping a container's dispatch path.
//!
//! A middleware turns the next dispatch function into a new one. The chain is
//! composed once, when the container is created, around a base dispatch that
//! runs the action's reducer and commits the result:
//!
//! ```text
//! dispatch(action)
//!   └─ M1 (pre) ─ M2 (pre) ─ base: reduce + merge + persist + notify ─ M2 (post) ─ M1 (post)
//! ```
//!
//! The **first** configured middleware is the outermost wrapper. A middleware
//! may inspect state around `next`, skip `next` entirely, or call it several
//! times; none of that is policed.
//!
//! A panic raised inside a middleware or reducer propagates to the caller of
//! `dispatch`; whatever was committed before the panic stays committed.

use crate::app::actions::Action;
use crate::app::registry::NamespaceSlot;
use crate::domain::StateShape;
use crate::infrastructure::sync::lock;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// A dispatch function: consumes an action, returns nothing.
pub type Dispatch<T> = Arc<dyn Fn(Action<T>) + Send + Sync>;

/// Composable wrapper around the dispatch path.
///
/// # Example
///
/// ```
/// use statebus::app::{Action, Dispatch, Middleware, MiddlewareApi};
/// use statebus::domain::StateShape;
/// use std::sync::Arc;
///
/// /// Drops actions whose type is not namespaced.
/// struct RequireNamespace;
///
/// impl<T: StateShape> Middleware<T> for RequireNamespace {
///     fn wrap(&self, _api: MiddlewareApi<T>, next: Dispatch<T>) -> Dispatch<T> {
///         Arc::new(move |action: Action<T>| {
///             if action.action_type().contains('/') {
///                 next(action);
///             }
///         })
///     }
/// }
/// ```
pub trait Middleware<T: StateShape>: Send + Sync {
    /// Returns a dispatch function that wraps `next`.
    fn wrap(&self, api: MiddlewareApi<T>, next: Dispatch<T>) -> Dispatch<T>;
}

/// State access handed to every middleware.
pub struct MiddlewareApi<T: StateShape> {
    slot: Arc<NamespaceSlot<T>>,
    composed: Weak<OnceLock<Dispatch<T>>>,
}

impl<T: StateShape> MiddlewareApi<T> {
    pub(crate) fn new(slot: Arc<NamespaceSlot<T>>, composed: Weak<OnceLock<Dispatch<T>>>) -> Self {
        Self { slot, composed }
    }

    /// Current full state.
    #[must_use]
    pub fn get_state(&self) -> T {
        lock(&self.slot.state).clone()
    }

    /// Dispatches through the **whole** composed chain, starting at the
    /// outermost middleware.
    ///
    /// Does nothing (with a warning) once every handle to the container has
    /// been dropped.
    pub fn dispatch(&self, action: Action<T>) {
        match self.composed.upgrade().and_then(|cell| cell.get().cloned()) {
            Some(dispatch) => dispatch(action),
            None => tracing::warn!(
                action_type = %action.action_type(),
                "container gone, action dropped"
            ),
        }
    }
}

impl<T: StateShape> Clone for MiddlewareApi<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            composed: Weak::clone(&self.composed),
        }
    }
}

impl<T: StateShape> fmt::Debug for MiddlewareApi<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareApi").finish_non_exhaustive()
    }
}

/// Composes `middleware` around `base`; the first entry ends up outermost.
#[must_use]
pub fn compose<T: StateShape>(
    base: Dispatch<T>,
    api: &MiddlewareApi<T>,
    middleware: &[Arc<dyn Middleware<T>>],
) -> Dispatch<T> {
    middleware
        .iter()
        .rev()
        .fold(base, |next, layer| layer.wrap(api.clone(), next))
}

/// Middleware built from a closure `(api, next, action)`.
pub struct FnMiddleware<F>(Arc<F>);

/// Wraps a closure as a [`Middleware`].
///
/// # Example
///
/// ```
/// use statebus::app::{middleware_fn, Action, Dispatch, MiddlewareApi};
/// use serde_json::{Map, Value};
///
/// let skip_everything = middleware_fn(
///     |_api: &MiddlewareApi<Map<String, Value>>, _next: &Dispatch<Map<String, Value>>, _action: Action<Map<String, Value>>| {},
/// );
/// # let _ = skip_everything;
/// ```
pub fn middleware_fn<T, F>(f: F) -> FnMiddleware<F>
where
    T: StateShape,
    F: Fn(&MiddlewareApi<T>, &Dispatch<T>, Action<T>) + Send + Sync + 'static,
{
    FnMiddleware(Arc::new(f))
}

impl<T, F> Middleware<T> for FnMiddleware<F>
where
    T: StateShape,
    F: Fn(&MiddlewareApi<T>, &Dispatch<T>, Action<T>) + Send + Sync + 'static,
{
    fn wrap(&self, api: MiddlewareApi<T>, next: Dispatch<T>) -> Dispatch<T> {
        let f = Arc::clone(&self.0);
        Arc::new(move |action: Action<T>| f(&api, &next, action))
    }
}

/// Logs every action with the state before and after it.
///
/// Output goes to `tracing` at debug level; states are rendered as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl<T: StateShape> Middleware<T> for LoggingMiddleware {
    fn wrap(&self, api: MiddlewareApi<T>, next: Dispatch<T>) -> Dispatch<T> {
        Arc::new(move |action: Action<T>| {
            let action_type = action.action_type().to_string();
            let _span = tracing::debug_span!("action", action_type = %action_type).entered();

            tracing::debug!(state = %render(&api.get_state()), "before");
            next(action);
            tracing::debug!(state = %render(&api.get_state()), "after");
        })
    }
}

fn render<T: StateShape>(state: &T) -> String {
    serde_json::to_string(state).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}
