//! OpenTelemetry bootstrap for processes embedding a tunnel
//!
//! The tunnel itself only emits `tracing` events and spans and records
//! metrics through the global meter. This module wires those up to an OTLP
//! collector and a JSON log formatter on stdout. Call
//! [`init_observability`] once at startup and [`shutdown_observability`]
//! before exit so the last batches are flushed.
//!
//! ```rust,no_run
//! use rpctunnel_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("render-farm-client")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!
//!     rpctunnel_core::init_observability(config).expect("Failed to init observability");
//!     // ... talk to the service ...
//!     rpctunnel_core::shutdown_observability();
//! }
//! ```
//!
//! `OTEL_EXPORTER_OTLP_ENDPOINT` and `RUST_LOG` provide the defaults for the
//! collector address and the log filter.

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

// Providers installed by init_observability, flushed by shutdown_observability
static PROVIDERS: Mutex<Option<Providers>> = Mutex::new(None);

struct Providers {
    tracer: Option<SdkTracerProvider>,
    meter: Option<SdkMeterProvider>,
}

/// What to export and where
///
/// Defaults: service name `"rpctunnel"`, the crate version, the endpoint
/// from `OTEL_EXPORTER_OTLP_ENDPOINT` (else `http://localhost:4317`), every
/// pillar on, and the level from `RUST_LOG` (else `"info"`).
///
/// ```rust
/// use rpctunnel_core::ObservabilityConfig;
///
/// let config = ObservabilityConfig::new("render-farm-client")
///     .with_endpoint("http://collector:4317")
///     .with_metrics(false);
/// assert!(!config.enable_metrics);
/// ```
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// `service.name` resource attribute
    pub service_name: String,
    /// `service.version` resource attribute
    pub service_version: String,
    /// OTLP/gRPC collector address
    pub otlp_endpoint: String,
    /// Export spans
    pub enable_traces: bool,
    /// Export metrics
    pub enable_metrics: bool,
    /// Write JSON logs to stdout
    pub enable_logs: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "rpctunnel".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            enable_logs: true,
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl ObservabilityConfig {
    /// Defaults with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    pub fn with_logs(mut self, enable: bool) -> Self {
        self.enable_logs = enable;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the exporters and the global `tracing` subscriber
///
/// Fails if an exporter cannot be built or a global subscriber is already
/// installed. Exporters connect lazily, so an unreachable collector is not
/// an error here.
pub fn init_observability(config: ObservabilityConfig) -> Result<(), BoxError> {
    let tracer_provider = if config.enable_traces {
        Some(init_tracer_provider(&config)?)
    } else {
        None
    };

    let meter_provider = if config.enable_metrics {
        Some(init_meter_provider(&config)?)
    } else {
        None
    };

    init_subscriber(&config, tracer_provider.as_ref())?;

    if let Ok(mut installed) = PROVIDERS.lock() {
        *installed = Some(Providers {
            tracer: tracer_provider,
            meter: meter_provider,
        });
    }

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        logs = config.enable_logs,
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer_provider(config: &ObservabilityConfig) -> Result<SdkTracerProvider, BoxError> {
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    global::set_tracer_provider(provider.clone());
    Ok(provider)
}

fn init_meter_provider(config: &ObservabilityConfig) -> Result<SdkMeterProvider, BoxError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider.clone());
    Ok(provider)
}

fn init_subscriber(
    config: &ObservabilityConfig,
    tracer_provider: Option<&SdkTracerProvider>,
) -> Result<(), BoxError> {
    use opentelemetry::trace::TracerProvider as _;

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let telemetry_layer = tracer_provider.map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    let fmt_layer = config.enable_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json()
    });

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Flush and shut down the providers installed by [`init_observability`]
///
/// Safe to call more than once, and without a prior init.
pub fn shutdown_observability() {
    let installed = match PROVIDERS.lock() {
        Ok(mut guard) => guard.take(),
        Err(_) => None,
    };
    let Some(providers) = installed else {
        return;
    };

    tracing::info!("Shutting down observability");

    if let Some(tracer) = providers.tracer {
        if let Err(e) = tracer.shutdown() {
            tracing::warn!(error = %e, "Tracer provider shutdown failed");
        }
    }
    if let Some(meter) = providers.meter {
        if let Err(e) = meter.shutdown() {
            tracing::warn!(error = %e, "Meter provider shutdown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.service_name, "rpctunnel");
        assert_eq!(config.service_version, env!("CARGO_PKG_VERSION"));
        assert!(config.enable_traces);
        assert!(config.enable_metrics);
        assert!(config.enable_logs);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ObservabilityConfig::new("render-farm-client")
            .with_endpoint("http://collector:4317")
            .with_log_level("rpctunnel_client=debug")
            .with_version("2.1.0")
            .with_traces(false)
            .with_logs(false);

        assert_eq!(config.service_name, "render-farm-client");
        assert_eq!(config.otlp_endpoint, "http://collector:4317");
        assert_eq!(config.log_level, "rpctunnel_client=debug");
        assert_eq!(config.service_version, "2.1.0");
        assert!(!config.enable_traces);
        assert!(config.enable_metrics);
        assert!(!config.enable_logs);
    }

    #[test]
    fn test_shutdown_without_init() {
        shutdown_observability();
        shutdown_observability();
    }

    #[test]
    fn test_init_all_disabled_then_shutdown() {
        let config = ObservabilityConfig::new("test-none")
            .with_traces(false)
            .with_metrics(false)
            .with_logs(false);

        assert!(init_observability(config).is_ok());
        shutdown_observability();
    }
}
