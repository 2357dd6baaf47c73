//! Small state slices built only on the public API.
//!
//! - [`counter`]: a persisted-or-not counter namespace driven by actions
//! - [`settings`]: application settings shared over a raw bus event

pub mod counter;
pub mod settings;

pub use counter::{Counter, CounterPatch, CounterState};
pub use settings::{AppSettings, AppSettingsEvents, Theme};
