//! Error types for statebus.
//!
//! This module defines the centralized error type [`StateError`] and a type alias
//! [`Result`] used throughout the crate. All errors are implemented with the
//! `thiserror` crate.
//!
//! Only [`StateError::Configuration`] and [`StateError::TypeMismatch`] ever reach
//! callers of the container API. Persistence failures are logged and swallowed at
//! the container boundary, and [`StateError::Handler`] is reported through the
//! log when a subscriber panics.

use thiserror::Error;

/// The main error type for statebus operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// A state container was configured with an invalid value.
    ///
    /// Raised synchronously at construction, e.g. for an empty namespace or one
    /// containing the `:` separator. The message names the offending namespace.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reading from or writing to a key/value store failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// State could not be converted to or from its JSON form.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A namespace was re-acquired with a different state type than the one it
    /// was created with.
    #[error("namespace `{namespace}` holds `{existing}`, cannot acquire it as `{requested}`")]
    TypeMismatch {
        /// Namespace being acquired.
        namespace: String,
        /// Type name the namespace was created with.
        existing: &'static str,
        /// Type name requested by the caller.
        requested: &'static str,
    },

    /// A subscriber panicked while handling a published event.
    #[error("handler for `{event}` panicked: {message}")]
    Handler {
        /// Event name being published.
        event: String,
        /// Panic payload rendered as text.
        message: String,
    },
}

/// A specialized `Result` type for statebus operations.
pub type Result<T> = std::result::Result<T, StateError>;
