//! Validated namespace keys.
//!
//! A namespace identifies one isolated state slice. Every name derived from it
//! (change event, qualified action type, storage key) is built here so the
//! formats live in one place.

use crate::domain::error::{Result, StateError};
use std::fmt;
use std::str::FromStr;

/// Separator used to build compound event names; forbidden inside namespaces.
pub const SEPARATOR: char = ':';

/// Suffix of the event published after every state update.
const CHANGE_EVENT_SUFFIX: &str = "stateChange";

/// Prefix of the default persistence key.
const STORAGE_KEY_PREFIX: &str = "state_";

/// A non-empty namespace string that does not contain [`SEPARATOR`].
///
/// # Examples
///
/// ```
/// use statebus::domain::Namespace;
///
/// let ns = Namespace::new("counter")?;
/// assert_eq!(ns.change_event(), "counter:stateChange");
/// assert_eq!(ns.qualify("INCREMENT"), "counter/INCREMENT");
/// assert_eq!(ns.default_storage_key(), "state_counter");
///
/// assert!(Namespace::new("").is_err());
/// assert!(Namespace::new("a:b").is_err());
/// # Ok::<(), statebus::StateError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace(String);

impl Namespace {
    /// Validates and wraps a namespace string.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Configuration`] if the name is empty or contains
    /// the `:` separator.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(StateError::Configuration(
                "namespace is required".to_string(),
            ));
        }
        if name.contains(SEPARATOR) {
            return Err(StateError::Configuration(format!(
                "namespace `{name}` cannot contain '{SEPARATOR}'"
            )));
        }
        Ok(Self(name))
    }

    /// Returns the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Event name published on every update: `"{namespace}:stateChange"`.
    #[must_use]
    pub fn change_event(&self) -> String {
        format!("{}{SEPARATOR}{CHANGE_EVENT_SUFFIX}", self.0)
    }

    /// Namespace-qualified action type: `"{namespace}/{raw}"`.
    #[must_use]
    pub fn qualify(&self, raw_type: &str) -> String {
        format!("{}/{raw_type}", self.0)
    }

    /// Persistence key used when none is configured: `"state_{namespace}"`.
    #[must_use]
    pub fn default_storage_key(&self) -> String {
        format!("{STORAGE_KEY_PREFIX}{}", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Namespace {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Namespace {
    type Error = StateError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for Namespace {
    type Error = StateError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}
