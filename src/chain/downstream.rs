//! Forwarding client for the next node in the chain.
//!
//! # Responsibilities
//! - Open a client span for the outbound call
//! - Inject trace context and baggage into the request headers
//! - Bound the call by the fixed downstream timeout and the caller's context
//! - Decode the JSON payload; keep transport and decode failures distinct

use std::time::Duration;

use opentelemetry::trace::SpanKind;
use opentelemetry::KeyValue;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::config::schema::DownstreamConfig;
use crate::context::ExecutionContext;
use crate::observability::metrics::NodeMetrics;
use crate::observability::pipeline::Telemetry;
use crate::observability::tracing::ScopedSpan;
use crate::resilience::timeouts::Interrupted;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Why a downstream call produced no payload.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid downstream url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("downstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("downstream call timed out after {0:?}")]
    Timeout(Duration),

    #[error("downstream call cancelled")]
    Cancelled,

    #[error("downstream returned an undecodable payload (status {status}): {source}")]
    Decode {
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },
}

impl ForwardError {
    /// Short label used for span attributes and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::InvalidUrl { .. } | ForwardError::Client(_) => "config",
            ForwardError::Transport(_) => "transport",
            ForwardError::Timeout(_) => "timeout",
            ForwardError::Cancelled => "cancelled",
            ForwardError::Decode { .. } => "decode",
        }
    }

    /// The call never produced a response (or did not finish in time).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ForwardError::Transport(_) | ForwardError::Timeout(_) | ForwardError::Cancelled
        )
    }

    /// A response arrived but was not a JSON object.
    pub fn is_decode(&self) -> bool {
        matches!(self, ForwardError::Decode { .. })
    }
}

/// Decoded answer of the next node.
#[derive(Debug, Clone)]
pub struct DownstreamReply {
    pub status: StatusCode,
    pub payload: Map<String, Value>,
}

/// HTTP client bound to one downstream node.
#[derive(Debug, Clone)]
pub struct Downstream {
    name: String,
    url: Url,
    timeout: Duration,
    client: reqwest::Client,
    telemetry: Telemetry,
    metrics: NodeMetrics,
}

/// Root path of `base`, keeping any path prefix.
pub fn root_url(base: &str) -> Result<Url, ForwardError> {
    let url = format!("{}/", base.trim_end_matches('/'));
    Url::parse(&url).map_err(|e| ForwardError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

impl Downstream {
    pub fn new(
        config: &DownstreamConfig,
        timeout: Duration,
        telemetry: Telemetry,
        metrics: NodeMetrics,
    ) -> Result<Self, ForwardError> {
        let url = root_url(&config.url)?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("otel-chain/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .build()
            .map_err(ForwardError::Client)?;

        Ok(Self {
            name: config.name.clone(),
            url,
            timeout,
            client,
            telemetry,
            metrics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Issue `GET /` on the next node on behalf of `ctx`.
    ///
    /// The call is bounded by the fixed downstream timeout, or by `ctx`'s
    /// own deadline when that is tighter, and stops as soon as `ctx` is
    /// cancelled.
    pub async fn call(
        &self,
        ctx: &ExecutionContext,
        request_id: Option<&str>,
    ) -> Result<DownstreamReply, ForwardError> {
        let call_ctx = ctx.with_timeout(self.timeout);
        let span = ScopedSpan::start(
            self.telemetry.tracer(),
            "call_downstream",
            SpanKind::Client,
            call_ctx.trace(),
        );
        span.set_attribute(KeyValue::new("downstream.name", self.name.clone()));
        span.set_attribute(KeyValue::new("downstream.url", self.url.to_string()));

        let mut headers = HeaderMap::new();
        self.telemetry.inject(span.context(), &mut headers);
        if let Some(id) = request_id.and_then(|id| HeaderValue::from_str(id).ok()) {
            headers.insert(X_REQUEST_ID, id);
        }

        let exchange = async {
            let response = self
                .client
                .get(self.url.clone())
                .headers(headers)
                .send()
                .await
                .map_err(ForwardError::Transport)?;

            let status = response.status();
            span.set_attribute(KeyValue::new(
                "http.response.status_code",
                i64::from(status.as_u16()),
            ));

            let body = response.bytes().await.map_err(ForwardError::Transport)?;
            let payload = serde_json::from_slice::<Map<String, Value>>(&body)
                .map_err(|source| ForwardError::Decode { status, source })?;

            Ok::<_, ForwardError>(DownstreamReply { status, payload })
        };

        let result = match call_ctx.run(exchange).await {
            Ok(result) => result,
            Err(Interrupted::DeadlineExceeded) => Err(ForwardError::Timeout(self.timeout)),
            Err(Interrupted::Cancelled) => Err(ForwardError::Cancelled),
        };

        if let Err(err) = &result {
            span.set_attribute(KeyValue::new("error.kind", err.kind()));
            span.record_error(err);
            self.metrics.record_downstream_failure(err.kind());
            tracing::warn!(
                downstream = %self.name,
                url = %self.url,
                error = %err,
                kind = err.kind(),
                "downstream call failed"
            );
        }

        result
    }
}
