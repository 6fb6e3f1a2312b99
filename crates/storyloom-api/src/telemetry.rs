//! Optional OpenTelemetry trace export.
//!
//! When enabled, spans recorded through `tracing` are also exported over
//! OTLP/gRPC. When disabled, no exporter is built and no layer is installed.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::registry::LookupSpan;

const DEFAULT_SERVICE_NAME: &str = "storyloom-api";

/// Trace export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Export spans when `true`.
    pub enabled: bool,
    /// OTLP collector endpoint; the exporter default when `None`.
    pub otlp_endpoint: Option<String>,
    /// `service.name` resource attribute.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: None,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Reads `STORYLOOM_TELEMETRY_ENABLED`, `OTEL_EXPORTER_OTLP_ENDPOINT` and
    /// `OTEL_SERVICE_NAME` through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("STORYLOOM_TELEMETRY_ENABLED")
            .is_some_and(|v| v == "true" || v == "1");
        let otlp_endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT");
        let service_name =
            lookup("OTEL_SERVICE_NAME").unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        Self {
            enabled,
            otlp_endpoint,
            service_name,
        }
    }
}

/// Errors raised while setting up or flushing trace export.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The OTLP exporter could not be built.
    #[error("failed to build OTLP exporter: {0}")]
    ExporterBuild(String),

    /// Flushing the provider on shutdown failed.
    #[error("tracer provider shutdown failed: {0}")]
    Shutdown(String),
}

/// Holds the tracer provider for the lifetime of the server.
#[derive(Debug)]
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// A guard that exports nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self { provider: None }
    }

    /// Returns `true` if spans are being exported.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// The `tracing` layer forwarding spans to the exporter, if enabled.
    pub fn layer<S>(&self) -> Option<impl Layer<S> + use<S>>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        self.provider.as_ref().map(|provider| {
            tracing_opentelemetry::layer().with_tracer(provider.tracer(DEFAULT_SERVICE_NAME))
        })
    }

    /// Flushes pending spans and stops the exporter.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::Shutdown` if the provider fails to flush.
    pub fn shutdown(&self) -> Result<(), TelemetryError> {
        match &self.provider {
            Some(provider) => provider
                .shutdown()
                .map_err(|e| TelemetryError::Shutdown(e.to_string())),
            None => Ok(()),
        }
    }
}

/// Builds the OTLP pipeline described by `config`.
///
/// Must be called from within a tokio runtime when export is enabled.
///
/// # Errors
///
/// Returns `TelemetryError::ExporterBuild` if the exporter cannot be built.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    if !config.enabled {
        return Ok(TelemetryGuard::disabled());
    }

    let mut exporter_builder = opentelemetry_otlp::SpanExporter::builder().with_tonic();
    if let Some(endpoint) = &config.otlp_endpoint {
        exporter_builder = exporter_builder.with_endpoint(endpoint);
    }
    let exporter = exporter_builder
        .build()
        .map_err(|e| TelemetryError::ExporterBuild(e.to_string()))?;

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();
    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();
    opentelemetry::global::set_tracer_provider(provider.clone());

    Ok(TelemetryGuard {
        provider: Some(provider),
    })
}
