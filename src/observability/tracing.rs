//! Distributed tracing support.
//!
//! # Responsibilities
//! - Open spans as children of an execution context's trace identity
//! - Guarantee every span is ended exactly once on every exit path
//!
//! # Design Decisions
//! - [`ScopedSpan`] owns its span; dropping it ends the span
//! - `end` consumes the handle, so nothing can be recorded after it

use std::borrow::Cow;
use std::error::Error as StdError;

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::Tracer;

/// Span handle released when it goes out of scope.
#[derive(Debug)]
pub struct ScopedSpan {
    cx: Context,
}

impl ScopedSpan {
    /// Start `name` as a child of the span active in `parent`.
    pub fn start(
        tracer: &Tracer,
        name: impl Into<Cow<'static, str>>,
        kind: SpanKind,
        parent: &Context,
    ) -> Self {
        let span = tracer
            .span_builder(name)
            .with_kind(kind)
            .start_with_context(tracer, parent);
        Self {
            cx: parent.with_span(span),
        }
    }

    /// Context carrying this span; children started from it link to it.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn set_attribute(&self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    /// Record `err` as an exception event and mark the span failed.
    pub fn record_error(&self, err: &(dyn StdError + 'static)) {
        let span = self.cx.span();
        span.record_error(err);
        span.set_status(Status::error(err.to_string()));
    }

    pub fn end(self) {
        // Drop does the work.
    }
}

impl Drop for ScopedSpan {
    fn drop(&mut self) {
        self.cx.span().end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};

    fn tracer() -> (Tracer, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (provider.tracer("test"), exporter)
    }

    #[derive(Debug, thiserror::Error)]
    #[error("downstream unreachable")]
    struct Unreachable;

    #[test]
    fn test_drop_ends_span_once() {
        let (tracer, exporter) = tracer();
        {
            let span = ScopedSpan::start(&tracer, "work", SpanKind::Internal, &Context::new());
            span.set_attribute(KeyValue::new("k", "v"));
        }

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].end_time >= spans[0].start_time);
        assert!(spans[0].attributes.contains(&KeyValue::new("k", "v")));
    }

    #[test]
    fn test_explicit_end_does_not_double_export() {
        let (tracer, exporter) = tracer();
        let span = ScopedSpan::start(&tracer, "work", SpanKind::Internal, &Context::new());
        span.end();
        assert_eq!(exporter.get_finished_spans().unwrap().len(), 1);
    }

    #[test]
    fn test_error_marks_span_failed() {
        let (tracer, exporter) = tracer();
        let span = ScopedSpan::start(&tracer, "call", SpanKind::Client, &Context::new());
        span.record_error(&Unreachable);
        drop(span);

        let spans = exporter.get_finished_spans().unwrap();
        assert!(matches!(spans[0].status, Status::Error { .. }));
    }

    #[test]
    fn test_child_links_to_parent() {
        let (tracer, exporter) = tracer();
        let parent = ScopedSpan::start(&tracer, "parent", SpanKind::Server, &Context::new());
        let child = ScopedSpan::start(&tracer, "child", SpanKind::Client, parent.context());
        let parent_id = parent.context().span().span_context().span_id();
        child.end();
        parent.end();

        let spans = exporter.get_finished_spans().unwrap();
        let child = spans.iter().find(|s| s.name == "child").unwrap();
        assert_eq!(child.parent_span_id, parent_id);
    }
}
