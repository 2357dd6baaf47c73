//! Storage layer for persisting state between runs.
//!
//! # Modules
//!
//! - `backend`: the [`KeyValueStore`] trait every adapter implements
//! - `memory`: process-local map store
//! - `json`: JSON file store with atomic writes (the durable default)
//! - `persistence`: per-container settings and the best-effort load/save path

pub mod backend;
pub mod json;
pub mod memory;
pub mod persistence;

pub use backend::KeyValueStore;
pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use persistence::Persistence;
