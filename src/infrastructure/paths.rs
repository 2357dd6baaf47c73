//! Path utilities for locating durable storage.
//!
//! The default persistence adapter is a JSON file under the user's data
//! directory, and trace export writes next to it. Resolution order:
//!
//! 1. `$XDG_DATA_HOME/statebus`
//! 2. `$HOME/.local/share/statebus`
//! 3. `<temp dir>/statebus`

use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "statebus";
const STORAGE_FILE: &str = "state.json";
const TRACE_FILE: &str = "statebus-otlp.json";

/// Returns the data directory for statebus files.
///
/// The directory is not created here; the store and trace exporter create it
/// on first use.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(xdg) = env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join(APP_DIR);
    }
    if let Some(home) = env::var_os("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home).join(".local").join("share").join(APP_DIR);
    }
    env::temp_dir().join(APP_DIR)
}

/// Default location of the JSON key/value store.
#[must_use]
pub fn default_storage_file() -> PathBuf {
    data_dir().join(STORAGE_FILE)
}

/// Default location of the OTLP trace file.
#[must_use]
pub fn default_trace_file() -> PathBuf {
    data_dir().join(TRACE_FILE)
}

/// Expands a leading `~` to the home directory.
///
/// Paths without a leading `~`, or when `HOME` is unset, are returned as-is.
///
/// # Examples
///
/// ```
/// use statebus::infrastructure::expand_tilde;
///
/// assert_eq!(expand_tilde("/absolute/path").to_str(), Some("/absolute/path"));
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = env::var_os("HOME").filter(|v| !v.is_empty());
    match (path, home) {
        ("~", Some(home)) => PathBuf::from(home),
        (p, Some(home)) if p.starts_with("~/") => PathBuf::from(home).join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}
