//! Domain layer for statebus.
//!
//! Core types shared by every other layer, free of storage and runtime
//! concerns.
//!
//! # Organization
//!
//! - [`error`]: Error types and result aliases
//! - [`namespace`]: Validated namespace keys and the names derived from them
//! - [`shape`]: The state shape contract and partial-update merging

pub mod error;
pub mod namespace;
pub mod shape;

pub use error::{Result, StateError};
pub use namespace::Namespace;
pub use shape::StateShape;
