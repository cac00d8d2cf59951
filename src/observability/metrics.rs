//! Metrics collection.
//!
//! # Metrics
//! - `chain.server.requests` (counter): requests by method, route, status
//! - `chain.server.duration` (histogram, seconds): latency distribution
//! - `chain.downstream.failures` (counter): failed forwards by error kind
//!
//! # Design Decisions
//! - Instruments are created once per node from the telemetry handle's meter
//! - Recording is lock-free; the SDK aggregates concurrently

use std::time::Instant;

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;

#[derive(Clone)]
pub struct NodeMetrics {
    requests: Counter<u64>,
    duration: Histogram<f64>,
    downstream_failures: Counter<u64>,
}

impl NodeMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter("chain.server.requests")
                .with_description("Inbound HTTP requests handled by this node")
                .build(),
            duration: meter
                .f64_histogram("chain.server.duration")
                .with_description("Time spent answering inbound HTTP requests")
                .with_unit("s")
                .build(),
            downstream_failures: meter
                .u64_counter("chain.downstream.failures")
                .with_description("Downstream calls that failed, by error kind")
                .build(),
        }
    }

    /// Record one answered request.
    pub fn record_request(&self, method: &str, route: &str, status: u16, start: Instant) {
        let attributes = [
            KeyValue::new("http.request.method", method.to_string()),
            KeyValue::new("http.route", route.to_string()),
            KeyValue::new("http.response.status_code", i64::from(status)),
        ];
        self.requests.add(1, &attributes);
        self.duration
            .record(start.elapsed().as_secs_f64(), &attributes);
    }

    pub fn record_downstream_failure(&self, kind: &'static str) {
        self.downstream_failures
            .add(1, &[KeyValue::new("error.kind", kind)]);
    }
}

impl std::fmt::Debug for NodeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeMetrics").finish_non_exhaustive()
    }
}
