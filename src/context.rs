//! Hierarchically scoped execution context.
//!
//! An [`ExecutionContext`] carries a cancellation signal, an optional
//! deadline and the causal trace identity (span context plus baggage).
//! Contexts are immutable; deriving a child creates a new value whose
//! cancellation is linked to the parent's.
//!
//! ```text
//! root (process)
//!   └── child (per inbound request)
//!         └── with_timeout (per outbound call)
//! ```

use std::future::Future;
use std::time::Duration;

use opentelemetry::baggage::BaggageExt;
use opentelemetry::trace::TraceContextExt;
use opentelemetry::{Context, KeyValue};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::resilience::timeouts::{run_bounded, tighter_deadline, Interrupted};

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
    trace: Context,
}

impl ExecutionContext {
    /// A fresh root context: never cancelled, no deadline, no trace.
    pub fn root() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
            trace: Context::new(),
        }
    }

    /// Derive a child that is cancelled whenever `self` is.
    ///
    /// Cancelling the child leaves the parent untouched.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
            trace: self.trace.clone(),
        }
    }

    /// Derive a child whose deadline is at most `limit` from now.
    pub fn with_timeout(&self, limit: Duration) -> Self {
        let mut child = self.child();
        child.deadline = Some(tighter_deadline(self.deadline, limit));
        child
    }

    /// Same scope, different trace identity.
    pub fn with_trace(&self, trace: Context) -> Self {
        Self {
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            trace,
        }
    }

    /// Same scope, with baggage entries added to the trace identity.
    pub fn with_baggage<I>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        self.with_trace(self.trace.with_baggage(entries))
    }

    pub fn trace(&self) -> &Context {
        &self.trace
    }

    /// Hex trace id of the attached span, if any.
    pub fn trace_id(&self) -> Option<String> {
        let span = self.trace.span();
        let span_context = span.span_context();
        span_context
            .is_valid()
            .then(|| span_context.trace_id().to_string())
    }

    pub fn baggage_value(&self, key: &str) -> Option<String> {
        self.trace.baggage().get(key).map(|value| value.to_string())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once this context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Guard that cancels this context when dropped.
    ///
    /// Request handlers hold one so that a dropped handler future (client
    /// disconnect, request timeout) cancels every call derived from it.
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.cancel.clone().drop_guard()
    }

    /// Run `fut` bounded by this context's cancellation and deadline.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        run_bounded(&self.cancel, self.deadline, fut).await
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::root()
    }
}
