//! The counter slice: a count plus the time it last changed.

use crate::app::{ActionCreator, StateConfig, StateContainer, StateRegistry};
use crate::bus::Subscription;
use crate::domain::Result;
use crate::storage::Persistence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::partial_state! {
    /// State of the `counter` namespace.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CounterState => CounterPatch {
        pub count: i64,
        pub last_updated: DateTime<Utc>,
    }
}

impl CounterState {
    /// Zero, stamped now.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            count: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Line shown by a count display.
#[must_use]
pub fn display_text(state: &CounterState) -> String {
    format!("Current count: {}", state.count)
}

/// Handle bundling the `counter` container with its actions.
#[derive(Debug, Clone)]
pub struct Counter {
    state: StateContainer<CounterState>,
    increment: ActionCreator<CounterState, ()>,
    add: ActionCreator<CounterState, i64>,
}

impl Counter {
    /// Namespace the counter lives under.
    pub const NAMESPACE: &'static str = "counter";

    /// Creates (or re-acquires) the counter without persistence.
    ///
    /// # Errors
    ///
    /// Fails if `counter` is already registered with another state type.
    pub fn new(registry: &StateRegistry) -> Result<Self> {
        Self::with_persistence(registry, Persistence::disabled())
    }

    /// Creates (or re-acquires) the counter with the given persistence.
    ///
    /// # Errors
    ///
    /// Fails if `counter` is already registered with another state type.
    pub fn with_persistence(registry: &StateRegistry, persistence: Persistence) -> Result<Self> {
        let state = registry.create_state(
            StateConfig::new(Self::NAMESPACE, CounterState::zero()).with_persistence(persistence),
        )?;

        let increment = state.create_action("INCREMENT", |current: &CounterState, _: &()| {
            CounterPatch::default()
                .count(current.count.saturating_add(1))
                .last_updated(Utc::now())
        });
        let add = state.create_action("ADD", |current: &CounterState, amount: &i64| {
            CounterPatch::default()
                .count(current.count.saturating_add(*amount))
                .last_updated(Utc::now())
        });

        Ok(Self {
            state,
            increment,
            add,
        })
    }

    pub fn increment(&self) {
        self.increment.create(());
    }

    pub fn add(&self, amount: i64) {
        self.add.create(amount);
    }

    /// Sets the count back to zero and restamps it.
    ///
    /// Unlike [`StateContainer::reset`] this does not restore the initial
    /// timestamp.
    pub fn reset(&self) {
        self.state
            .set_state(CounterPatch::default().count(0).last_updated(Utc::now()));
    }

    #[must_use]
    pub fn count(&self) -> i64 {
        self.state.get_state().count
    }

    #[must_use]
    pub fn display_text(&self) -> String {
        display_text(&self.state.get_state())
    }

    /// Calls `callback` with the display line after every change.
    pub fn on_display<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.state
            .subscribe(move |state: &CounterState| callback(&display_text(state)))
    }

    /// The underlying container.
    #[must_use]
    pub fn state(&self) -> &StateContainer<CounterState> {
        &self.state
    }
}
