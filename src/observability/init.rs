//! Global subscriber installation.

use super::exporter::file_tracer_provider;
use super::otlp::SCOPE;
use crate::domain::Result;
use crate::infrastructure::default_trace_file;
use crate::Config;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_sdk::resource::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global `tracing` subscriber with OTLP/JSON file export.
///
/// The filter comes from `RUST_LOG` when set, else `config.trace_level`, else
/// `info`. Spans go to `config.trace_file`, or `statebus-otlp.json` in the
/// data directory.
///
/// Installing twice is harmless: the first subscriber stays in place.
///
/// # Errors
///
/// Returns [`StateError::Io`](crate::StateError::Io) if the trace directory
/// cannot be created.
pub fn init_tracing(config: &Config) -> Result<()> {
    let trace_file = config.trace_file.clone().unwrap_or_else(default_trace_file);
    if let Some(dir) = trace_file.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(config.trace_level.as_deref().unwrap_or("info"))
    });

    let resource = Resource::new(vec![
        KeyValue::new("service.name", SCOPE),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);
    let provider = file_tracer_provider(trace_file.clone(), resource);
    let layer = OpenTelemetryLayer::new(provider.tracer(SCOPE));

    if tracing_subscriber::registry().with(filter).with(layer).try_init().is_ok() {
        tracing::info!(trace_file = %trace_file.display(), "tracing initialized");
    }
    Ok(())
}
