//! OpenTelemetry tracing with file-based export.
//!
//! ```text
//! tracing spans → tracing-opentelemetry → SDK (simple processor)
//!               → OTLP/JSON encoder → rotating file (10 MiB, 3 backups)
//! ```
//!
//! Nothing here is required for state management to work: containers only
//! emit `tracing` events and spans, which are dropped when no subscriber is
//! installed. Call [`init_tracing`] (or set `trace_level` in
//! [`Config`](crate::Config) and use [`initialize`](crate::initialize)) to
//! capture them.
//!
//! Filter precedence:
//! 1. `RUST_LOG`
//! 2. `Config::trace_level`
//! 3. `info`

mod exporter;
mod init;
mod otlp;
mod rotation;

pub use init::init_tracing;
