//! Telemetry pipeline construction.
//!
//! Builds three independent export pipelines (traces, metrics, logs) for one
//! service and bundles them into a [`Telemetry`] handle. The handle is passed
//! to every component that emits telemetry; nothing is installed as a
//! process-wide global here.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{Context, InstrumentationScope, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, SdkTracerProvider, Tracer};
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::config::schema::{TelemetryConfig, DEFAULT_OTLP_ENDPOINT};
use crate::lifecycle::shutdown::{ShutdownError, ShutdownRegistry};
use crate::observability::propagation;

/// Construction failure of one of the export pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("failed to build {signal} exporter: {reason}")]
    Exporter { signal: &'static str, reason: String },

    /// Construction failed and tearing down the pipelines built so far
    /// failed as well.
    #[error("{source}\n{teardown}")]
    PartialTeardown {
        source: Box<PipelineError>,
        teardown: ShutdownError,
    },
}

impl PipelineError {
    pub fn exporter(signal: &'static str, reason: impl ToString) -> Self {
        Self::Exporter {
            signal,
            reason: reason.to_string(),
        }
    }
}

/// Produces the provider for each signal.
///
/// [`DefaultExporters`] is used in production; tests substitute in-memory
/// or deliberately failing implementations.
pub trait ExporterFactory {
    fn tracer_provider(
        &self,
        resource: Resource,
        endpoint: &str,
    ) -> Result<SdkTracerProvider, PipelineError>;

    fn meter_provider(&self, resource: Resource) -> Result<SdkMeterProvider, PipelineError>;

    fn logger_provider(&self, resource: Resource) -> Result<SdkLoggerProvider, PipelineError>;
}

/// OTLP/gRPC traces, stdout metrics and stdout logs.
#[derive(Debug, Clone)]
pub struct DefaultExporters {
    pub trace_batch_delay: Duration,
    pub metric_interval: Duration,
}

impl Default for DefaultExporters {
    fn default() -> Self {
        Self::from(&TelemetryConfig::default())
    }
}

impl From<&TelemetryConfig> for DefaultExporters {
    fn from(config: &TelemetryConfig) -> Self {
        Self {
            trace_batch_delay: Duration::from_millis(config.trace_batch_delay_ms),
            metric_interval: Duration::from_secs(config.metric_interval_secs),
        }
    }
}

impl ExporterFactory for DefaultExporters {
    fn tracer_provider(
        &self,
        resource: Resource,
        endpoint: &str,
    ) -> Result<SdkTracerProvider, PipelineError> {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| PipelineError::exporter("trace", e))?;

        let batch_config = BatchConfigBuilder::default()
            .with_scheduled_delay(self.trace_batch_delay)
            .build();
        let processor = BatchSpanProcessor::builder(exporter)
            .with_batch_config(batch_config)
            .build();

        Ok(SdkTracerProvider::builder()
            .with_resource(resource)
            .with_span_processor(processor)
            .build())
    }

    fn meter_provider(&self, resource: Resource) -> Result<SdkMeterProvider, PipelineError> {
        let exporter = opentelemetry_stdout::MetricExporter::default();
        let reader = PeriodicReader::builder(exporter)
            .with_interval(self.metric_interval)
            .build();

        Ok(SdkMeterProvider::builder()
            .with_resource(resource)
            .with_reader(reader)
            .build())
    }

    fn logger_provider(&self, resource: Resource) -> Result<SdkLoggerProvider, PipelineError> {
        let exporter = opentelemetry_stdout::LogExporter::default();

        Ok(SdkLoggerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build())
    }
}

/// Normalize an exporter endpoint: empty falls back to the local collector,
/// a bare `host:port` gets an `http://` scheme.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        DEFAULT_OTLP_ENDPOINT.to_string()
    } else if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// Build the trace, metric and log pipelines for `service_name`.
///
/// `endpoint` is the trace collector address; empty means the local
/// default. If a later pipeline fails, the ones already built are shut
/// down before the error is returned, which blocks while they flush.
pub fn build<F>(
    service_name: &str,
    endpoint: &str,
    factory: &F,
) -> Result<Telemetry, PipelineError>
where
    F: ExporterFactory + ?Sized,
{
    if service_name.trim().is_empty() {
        return Err(PipelineError::EmptyServiceName);
    }

    let endpoint = normalize_endpoint(endpoint);
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .with_attribute(KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")))
        .build();

    let registry = ShutdownRegistry::new();
    let fail = |err: PipelineError, registry: &ShutdownRegistry| match registry.shutdown() {
        Ok(()) => err,
        Err(teardown) => PipelineError::PartialTeardown {
            source: Box::new(err),
            teardown,
        },
    };

    let tracer_provider = match factory.tracer_provider(resource.clone(), &endpoint) {
        Ok(provider) => provider,
        Err(err) => return Err(fail(err, &registry)),
    };
    let teardown = tracer_provider.clone();
    registry.register("tracer_provider", move || teardown.shutdown());

    let meter_provider = match factory.meter_provider(resource.clone()) {
        Ok(provider) => provider,
        Err(err) => return Err(fail(err, &registry)),
    };
    let teardown = meter_provider.clone();
    registry.register("meter_provider", move || teardown.shutdown());

    let logger_provider = match factory.logger_provider(resource) {
        Ok(provider) => provider,
        Err(err) => return Err(fail(err, &registry)),
    };
    let teardown = logger_provider.clone();
    registry.register("logger_provider", move || teardown.shutdown());

    let tracer = tracer_provider.tracer(service_name.to_string());
    let meter = meter_provider
        .meter_with_scope(InstrumentationScope::builder(service_name.to_string()).build());
    let propagator = TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]);

    Ok(Telemetry {
        inner: Arc::new(TelemetryInner {
            service_name: service_name.to_string(),
            tracer,
            meter,
            logger_provider,
            propagator,
            registry,
        }),
    })
}

/// Shared handle to one service's tracer, meter, logger provider and
/// propagation policy.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    service_name: String,
    tracer: Tracer,
    meter: Meter,
    logger_provider: SdkLoggerProvider,
    propagator: TextMapCompositePropagator,
    registry: ShutdownRegistry,
}

impl Telemetry {
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    pub fn tracer(&self) -> &Tracer {
        &self.inner.tracer
    }

    pub fn meter(&self) -> &Meter {
        &self.inner.meter
    }

    pub fn logger_provider(&self) -> &SdkLoggerProvider {
        &self.inner.logger_provider
    }

    /// Write `cx` into outbound request headers.
    pub fn inject(&self, cx: &Context, headers: &mut HeaderMap) {
        propagation::inject(&self.inner.propagator, cx, headers);
    }

    /// Read the caller's trace identity from inbound request headers.
    pub fn extract(&self, headers: &HeaderMap) -> Context {
        propagation::extract(&self.inner.propagator, headers)
    }

    /// Flush and shut down every pipeline. Later calls are no-ops.
    ///
    /// Blocks while exporters flush; call it from a blocking thread when
    /// running inside the async runtime.
    pub fn shutdown(&self) -> Result<(), ShutdownError> {
        self.inner.registry.shutdown()
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("service_name", &self.inner.service_name)
            .field("registry", &self.inner.registry)
            .finish()
    }
}
