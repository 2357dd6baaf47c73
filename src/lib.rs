//! Statebus: namespaced state containers over a shared event bus.
//!
//! Statebus keeps independent slices of application state, one per
//! namespace, and provides:
//! - Shallow-merge updates with synchronous change notification
//! - Reducer-carrying actions dispatched through a composable middleware chain
//! - Best-effort persistence through pluggable key/value stores
//! - A plain publish/subscribe bus usable for anything else
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Application Layer (app/)                           │
//! │  - StateRegistry: namespace → state cell            │
//! │  - StateContainer: get / set / reset / subscribe    │
//! │  - Actions, creators, middleware composition        │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Event Bus     │   │ Storage Layer │   │ Demo slices   │
//! │ (bus/)        │   │ (storage/)    │   │ (demo/)       │
//! │ - Pub/sub     │   │ - Memory      │   │ - Counter     │
//! │ - Isolation   │   │ - JSON file   │   │ - Settings    │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!         │                    │                    │
//! ┌─────────────────────────────────────────────────────┐
//! │  Infrastructure & Domain Layers                     │
//! │  - Platform paths, lock helpers (infrastructure/)   │
//! │  - Namespace, StateShape, errors (domain/)          │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Observability (observability/)                     │  ← Optional
//! │  - OpenTelemetry tracing, OTLP/JSON file export     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`app`]: registry, containers, actions and middleware
//! - [`bus`]: the event bus
//! - [`demo`]: small state slices built on the public API
//! - [`domain`]: namespaces, the state shape contract, errors
//! - [`infrastructure`]: data directory resolution
//! - [`observability`]: tracing setup
//! - [`storage`]: key/value stores and persistence settings
//!
//! # Example
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use statebus::{StateConfig, StateRegistry};
//! use std::sync::{Arc, Mutex};
//!
//! statebus::partial_state! {
//!     #[derive(Debug, Clone, Serialize, Deserialize)]
//!     pub struct Counter => CounterPatch {
//!         pub count: i64,
//!     }
//! }
//!
//! let registry = StateRegistry::in_memory();
//! let counter = registry.create_state(StateConfig::new("counter", Counter { count: 0 }))?;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let subscription = counter.subscribe(move |state: &Counter| sink.lock().unwrap().push(state.count));
//!
//! let increment = counter.create_action("INCREMENT", |state: &Counter, _: &()| {
//!     CounterPatch::default().count(state.count + 1)
//! });
//! increment.create(());
//! increment.create(());
//! subscription.unsubscribe();
//! counter.reset();
//!
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
//! assert_eq!(counter.get_state().count, 0);
//! # Ok::<(), statebus::StateError>(())
//! ```
//!
//! # Key Design Decisions
//!
//! ## Explicit registry
//!
//! There is no process-global state. A [`StateRegistry`] is created at startup
//! (usually via [`initialize`]) and passed to whoever needs it. Namespaces live
//! as long as the registry.
//!
//! ## Synchronous delivery
//!
//! Notification happens on the writing thread before the write returns. Writes
//! to one namespace are serialized by a re-entrant per-namespace gate that
//! covers reduce, merge, persist and publish. The state lock itself is only held
//! for the merge, so reducers, middleware, stores and subscribers may all read
//! or write the container from the writing thread. A callback that hands a
//! write to another thread and waits for it will deadlock.
//!
//! ## Best-effort persistence
//!
//! Store failures are logged and swallowed. A broken store never blocks an
//! in-memory update or its notification.

pub mod app;
pub mod bus;
pub mod demo;
pub mod domain;
pub mod infrastructure;
pub mod observability;
pub mod storage;

pub use app::{
    Action, ActionCreator, ActionRegistry, LoggingMiddleware, Middleware, MiddlewareApi,
    StateConfig, StateContainer, StateRegistry,
};
pub use bus::{EventBus, Subscription};
pub use domain::{Namespace, Result, StateError, StateShape};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, Persistence};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Runtime configuration.
///
/// Every field is optional; the defaults give a JSON store in the platform
/// data directory and no tracing.
///
/// # Example
///
/// ```toml
/// storage_path = "~/.local/share/myapp/state.json"
/// trace_level = "debug"
/// trace_file = "/tmp/myapp-otlp.json"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON file backing the default store.
    ///
    /// Default: `state.json` in the data directory (see [`infrastructure::data_dir`]).
    pub storage_path: Option<PathBuf>,

    /// Tracing filter directive such as `info` or `statebus=debug`.
    ///
    /// Tracing is only installed when this is set. `RUST_LOG` takes precedence.
    pub trace_level: Option<String>,

    /// File receiving OTLP/JSON spans.
    ///
    /// Default: `statebus-otlp.json` in the data directory.
    pub trace_file: Option<PathBuf>,
}

impl Config {
    /// Builds configuration from a flat string map.
    ///
    /// Empty values count as unset and paths get `~` expanded. Unknown keys
    /// are ignored.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeMap;
    /// use statebus::Config;
    ///
    /// let mut map = BTreeMap::new();
    /// map.insert("trace_level".to_string(), "debug".to_string());
    /// map.insert("storage_path".to_string(), "".to_string());
    ///
    /// let config = Config::from_map(&map);
    /// assert_eq!(config.trace_level.as_deref(), Some("debug"));
    /// assert!(config.storage_path.is_none());
    /// ```
    #[must_use]
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let value = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        Self {
            storage_path: value("storage_path").map(|p| infrastructure::expand_tilde(&p)),
            trace_level: value("trace_level"),
            trace_file: value("trace_file").map(|p| infrastructure::expand_tilde(&p)),
        }
    }

    /// Reads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// - [`StateError::Io`] if the file cannot be read
    /// - [`StateError::Configuration`] if it is not valid TOML for [`Config`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&text)
            .map_err(|e| StateError::Configuration(format!("invalid config {}: {e}", path.display())))?;

        config.storage_path = config
            .storage_path
            .map(|p| infrastructure::expand_tilde(&p.to_string_lossy()));
        config.trace_file = config
            .trace_file
            .map(|p| infrastructure::expand_tilde(&p.to_string_lossy()));
        Ok(config)
    }
}

/// Builds a registry from configuration.
///
/// - Installs tracing when `trace_level` is set (failure is logged, not fatal)
/// - Opens the JSON file store at `storage_path` or the default location
/// - Creates a fresh [`EventBus`]
///
/// # Errors
///
/// Returns an error if the storage file exists but cannot be read or parsed,
/// or its directory cannot be created.
///
/// # Example
///
/// ```rust
/// use statebus::{initialize, Config};
///
/// let dir = tempfile::tempdir()?;
/// let config = Config {
///     storage_path: Some(dir.path().join("state.json")),
///     ..Default::default()
/// };
///
/// let registry = initialize(&config)?;
/// assert!(registry.namespaces().is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn initialize(config: &Config) -> Result<StateRegistry> {
    if config.trace_level.is_some() {
        if let Err(e) = observability::init_tracing(config) {
            tracing::warn!(error = %e, "tracing disabled");
        }
    }

    let storage_path = config
        .storage_path
        .clone()
        .unwrap_or_else(infrastructure::default_storage_file);
    let store = JsonFileStore::open(&storage_path)?;
    tracing::debug!(storage = %storage_path.display(), "initializing statebus");

    Ok(StateRegistry::new(Arc::new(EventBus::new()), Arc::new(store)))
}
