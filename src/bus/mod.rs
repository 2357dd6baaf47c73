//! Event bus layer.
//!
//! A single [`EventBus`] is constructed at application start and handed to the
//! [`StateRegistry`](crate::app::StateRegistry) and to any code that publishes
//! its own events (see [`demo::settings`](crate::demo::settings)).

pub mod event_bus;

pub use event_bus::{EventBus, Subscription, SubscriptionId};
