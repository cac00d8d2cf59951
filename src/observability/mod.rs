//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline.rs builds, per service:
//!     → trace pipeline  (OTLP/gRPC, batched)
//!     → metric pipeline (stdout, periodic reader)
//!     → log pipeline    (stdout, batched)
//!   and returns one Telemetry handle + one shutdown registry
//!
//! Producers holding the handle:
//!     → tracing.rs     (ScopedSpan per unit of work)
//!     → propagation.rs (traceparent/baggage headers in and out)
//!     → metrics.rs     (request counters and latency)
//!     → logging.rs     (tracing events → console + log pipeline)
//! ```
//!
//! # Design Decisions
//! - The handle is passed explicitly; no global tracer/meter/propagator
//! - Teardown runs through the lifecycle shutdown registry

pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod propagation;
pub mod tracing;

pub use logging::{init_logging, LoggingError};
pub use metrics::NodeMetrics;
pub use pipeline::{build, normalize_endpoint, DefaultExporters, ExporterFactory, PipelineError, Telemetry};
pub use tracing::ScopedSpan;
