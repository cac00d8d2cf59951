//! Route handlers.
//!
//! `GET /` opens the request span and either forwards along the chain or
//! performs the terminal node's local work. `GET /health` answers without
//! touching telemetry or the downstream node.

use axum::{
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    Json,
};
use opentelemetry::trace::SpanKind;
use opentelemetry::KeyValue;

use crate::chain::NodeRole;
use crate::http::request;
use crate::http::response::{ForwardResult, NodeError, TerminalPayload, SUCCESS};
use crate::http::server::NodeState;
use crate::observability::tracing::ScopedSpan;

pub async fn handle_root(
    State(state): State<NodeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, NodeError> {
    let parent = state.telemetry.extract(&headers);
    let request_ctx = state.root.child().with_trace(parent);
    // Dropped with the handler future, e.g. on client disconnect.
    let _disconnect = request_ctx.cancel_on_drop();

    let span = ScopedSpan::start(
        state.telemetry.tracer(),
        "handle_root",
        SpanKind::Server,
        request_ctx.trace(),
    );
    span.set_attribute(KeyValue::new("http.method", method.as_str().to_string()));
    span.set_attribute(KeyValue::new("http.path", uri.path().to_string()));

    let ctx = request_ctx.with_trace(span.context().clone());
    let request_id = request::request_id(&headers);

    tracing::info!(
        service = %state.service_name,
        request_id = request_id.unwrap_or("unknown"),
        trace_id = ctx.trace_id().as_deref().unwrap_or("none"),
        method = %method,
        path = uri.path(),
        "handling request"
    );

    match state.role.as_ref() {
        NodeRole::Forward(downstream) => match downstream.call(&ctx, request_id).await {
            Ok(reply) => {
                tracing::info!(
                    service = %state.service_name,
                    downstream = downstream.name(),
                    url = %downstream.url(),
                    status = %reply.status,
                    "downstream answered"
                );
                let body = ForwardResult {
                    service: state.service_name.to_string(),
                    message: state.message.to_string(),
                    result: reply.payload,
                };
                Ok(Json(body).into_response())
            }
            Err(err) => {
                span.record_error(&err);
                tracing::error!(
                    service = %state.service_name,
                    downstream = downstream.name(),
                    error = %err,
                    "forwarding failed"
                );
                Err(err.into())
            }
        },
        NodeRole::Terminal(work) => {
            tracing::debug!(service = %state.service_name, delay = ?work.delay(), "performing local work");
            if let Err(err) = work.perform(&ctx).await {
                span.record_error(&err);
                tracing::warn!(service = %state.service_name, error = %err, "local work interrupted");
                return Err(err.into());
            }

            span.set_attribute(KeyValue::new("response.status", SUCCESS));
            let body = TerminalPayload {
                service: state.service_name.to_string(),
                message: state.message.to_string(),
                status: SUCCESS.to_string(),
            };
            Ok(Json(body).into_response())
        }
    }
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "OK"
}
