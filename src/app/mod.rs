//! Application layer: namespaced state containers and their dispatch path.
//!
//! # Data flow
//!
//! ```text
//! ActionCreator::create(payload)
//!        │
//!        ▼
//! composed dispatch ── M1 ── M2 ── … ── base
//!                                        │ reduce(current, payload) → partial
//!                                        │ merge under lock, persist
//!                                        ▼
//!                          EventBus::publish("{ns}:stateChange", &state)
//!                                        │
//!                                        ▼
//!                                   subscribers
//! ```
//!
//! `StateContainer::set_state` enters at the base and skips middleware.
//!
//! # Modules
//!
//! - [`actions`]: actions, action creators and the per-namespace action registry
//! - [`middleware`]: the middleware trait, its API handle and composition
//! - [`registry`]: the owner of all namespaces
//! - [`state`]: container configuration and the container handle itself

pub mod actions;
pub mod middleware;
pub mod registry;
pub mod state;

pub use actions::{Action, ActionCreator, ActionEntry, ActionRegistry, Reducer};
pub use middleware::{compose, middleware_fn, Dispatch, FnMiddleware, LoggingMiddleware, Middleware, MiddlewareApi};
pub use registry::StateRegistry;
pub use state::{StateConfig, StateContainer};
