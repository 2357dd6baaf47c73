//! Span exporter writing OTLP/JSON lines to a rotating file.

use super::otlp::OtlpEncoder;
use super::rotation::RotatingFile;
use futures_util::future::BoxFuture;
use opentelemetry::trace::TraceError;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::trace::{Config as TraceConfig, TracerProvider};
use std::future;
use std::path::PathBuf;

struct JsonLinesExporter {
    file: RotatingFile,
    encoder: OtlpEncoder,
    closed: bool,
}

impl SpanExporter for JsonLinesExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let result = if self.closed {
            Err(TraceError::from("trace exporter already shut down"))
        } else {
            let line = self.encoder.encode(&batch).to_string();
            self.file
                .append_line(&line)
                .map_err(|e| TraceError::from(e.to_string()))
        };
        Box::pin(future::ready(result))
    }

    fn shutdown(&mut self) {
        self.closed = true;
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.encoder = OtlpEncoder::new(resource);
    }
}

impl std::fmt::Debug for JsonLinesExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesExporter")
            .field("file", &self.file)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Provider exporting every finished span synchronously to `trace_file`.
pub(crate) fn file_tracer_provider(trace_file: PathBuf, resource: Resource) -> TracerProvider {
    let exporter = JsonLinesExporter {
        file: RotatingFile::new(trace_file),
        encoder: OtlpEncoder::new(&resource),
        closed: false,
    };

    TracerProvider::builder()
        .with_config(TraceConfig::default().with_resource(resource))
        .with_simple_exporter(exporter)
        .build()
}
