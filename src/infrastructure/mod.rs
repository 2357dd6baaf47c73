//! Infrastructure layer for filesystem, environment and locking utilities.
//!
//! - [`paths`]: data directory resolution and `~` expansion
//! - `sync`: poison-tolerant locking and the per-namespace writer gate

pub mod paths;
pub(crate) mod sync;

pub use paths::{data_dir, default_storage_file, default_trace_file, expand_tilde};
