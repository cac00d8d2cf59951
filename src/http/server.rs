//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the node's role (forwarder or terminal) from its configuration
//! - Create the Axum router with `GET /` and `GET /health`
//! - Wire up middleware (timeout, request ID, metrics, trace logs)
//! - Serve HTTP/1.1 on a pre-bound listener until told to drain
//! - Close connections that are slow to send their request head

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::server::graceful::GracefulShutdown;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::chain::{Downstream, ForwardError, LocalWork, NodeRole};
use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::http::handlers::{handle_root, health};
use crate::http::middleware::track_metrics;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::observability::metrics::NodeMetrics;
use crate::observability::pipeline::Telemetry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct NodeState {
    pub service_name: Arc<str>,
    pub message: Arc<str>,
    pub role: Arc<NodeRole>,
    pub telemetry: Telemetry,
    /// Base of every request-scoped context.
    pub root: ExecutionContext,
}

/// HTTP server for one chain node.
pub struct NodeServer {
    router: Router,
    service_name: String,
    read_header_timeout: Duration,
}

impl NodeServer {
    /// Create the server for `config`.
    ///
    /// Request contexts derive from `root`; cancelling it interrupts every
    /// in-flight downstream call and local work.
    pub fn new(
        config: &NodeConfig,
        telemetry: Telemetry,
        root: ExecutionContext,
    ) -> Result<Self, ForwardError> {
        let metrics = NodeMetrics::new(telemetry.meter());

        let role = match &config.downstream {
            Some(downstream) => NodeRole::Forward(Downstream::new(
                downstream,
                config.timeouts.downstream(),
                telemetry.clone(),
                metrics.clone(),
            )?),
            None => NodeRole::Terminal(LocalWork::new(config.work.delay())),
        };

        let state = NodeState {
            service_name: Arc::from(config.service_name.as_str()),
            message: Arc::from(config.message.as_str()),
            role: Arc::new(role),
            telemetry,
            root,
        };

        let router = Self::build_router(config, state, metrics);
        Ok(Self {
            router,
            service_name: config.service_name.clone(),
            read_header_timeout: config.timeouts.read_header(),
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &NodeConfig, state: NodeState, metrics: NodeMetrics) -> Router {
        Router::new()
            .route("/", get(handle_root))
            .route("/health", get(health))
            .with_state(state)
            .route_layer(middleware::from_fn_with_state(metrics, track_metrics))
            .layer(TimeoutLayer::new(config.timeouts.request()))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` is cancelled and in-flight
    /// requests have finished.
    ///
    /// Connections that do not deliver a complete request head within
    /// `timeouts.read_header_secs` are closed.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            service = %self.service_name,
            address = %addr,
            read_header_timeout = ?self.read_header_timeout,
            "HTTP server starting"
        );

        let mut http = http1::Builder::new();
        http.timer(TokioTimer::new())
            .header_read_timeout(self.read_header_timeout);

        let graceful = GracefulShutdown::new();
        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) if is_connection_error(&e) => {
                        tracing::debug!(error = %e, "Connection dropped during accept");
                        continue;
                    }
                    Err(e) => return Err(e),
                },
                () = shutdown.cancelled() => break,
            };

            let service = TowerToHyperService::new(self.router.clone());
            let connection = http
                .serve_connection(TokioIo::new(stream), service);
            let connection = graceful.watch(connection);

            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::debug!(peer = %peer, error = %e, "Connection closed with error");
                }
            });
        }

        drop(listener);
        tracing::info!(service = %self.service_name, "Draining open connections");
        graceful.shutdown().await;

        tracing::info!(service = %self.service_name, "HTTP server stopped");
        Ok(())
    }
}

/// Accept errors that concern a single connection, not the listener.
fn is_connection_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodePreset;
    use crate::observability::pipeline::{build, ExporterFactory, PipelineError};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use opentelemetry_sdk::logs::{InMemoryLogExporter, SdkLoggerProvider};
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
    use opentelemetry_sdk::Resource;
    use tower::ServiceExt;

    struct InMemory {
        spans: InMemorySpanExporter,
    }

    impl ExporterFactory for InMemory {
        fn tracer_provider(&self, resource: Resource, _endpoint: &str) -> Result<SdkTracerProvider, PipelineError> {
            Ok(SdkTracerProvider::builder()
                .with_resource(resource)
                .with_simple_exporter(self.spans.clone())
                .build())
        }

        fn meter_provider(&self, resource: Resource) -> Result<SdkMeterProvider, PipelineError> {
            let reader = PeriodicReader::builder(InMemoryMetricExporter::default()).build();
            Ok(SdkMeterProvider::builder()
                .with_resource(resource)
                .with_reader(reader)
                .build())
        }

        fn logger_provider(&self, resource: Resource) -> Result<SdkLoggerProvider, PipelineError> {
            Ok(SdkLoggerProvider::builder()
                .with_resource(resource)
                .with_simple_exporter(InMemoryLogExporter::default())
                .build())
        }
    }

    fn terminal_node(spans: &InMemorySpanExporter) -> NodeServer {
        let mut config = NodeConfig::preset(NodePreset::C);
        config.work.delay_ms = 1;
        let factory = InMemory { spans: spans.clone() };
        let telemetry = build(&config.service_name, "", &factory).unwrap();
        NodeServer::new(&config, telemetry, ExecutionContext::root()).unwrap()
    }

    #[tokio::test]
    async fn test_health_answers_ok_without_span() {
        let spans = InMemorySpanExporter::default();
        let server = terminal_node(&spans);

        let response = server
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64).await.unwrap();
        assert_eq!(&body[..], b"OK");
        assert!(spans.get_finished_spans().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_root_returns_success_payload() {
        let spans = InMemorySpanExporter::default();
        let server = terminal_node(&spans);

        let response = server
            .router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["service"], "app-c");
        assert_eq!(json["message"], "final response from app-c");
        assert_eq!(json["status"], "success");

        let finished = spans.get_finished_spans().unwrap();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].name, "handle_root");
        assert!(finished[0].end_time >= finished[0].start_time);
    }

    #[tokio::test]
    async fn test_root_span_records_actual_method_and_path() {
        let spans = InMemorySpanExporter::default();
        let server = terminal_node(&spans);

        let response = server
            .router()
            .oneshot(Request::head("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let finished = spans.get_finished_spans().unwrap();
        assert_eq!(finished.len(), 1);
        let attr = |key: &str| {
            finished[0]
                .attributes
                .iter()
                .find(|kv| kv.key.as_str() == key)
                .map(|kv| kv.value.as_str().to_string())
        };
        assert_eq!(attr("http.method").as_deref(), Some("HEAD"));
        assert_eq!(attr("http.path").as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_cancelled_root_fails_terminal_work() {
        let spans = InMemorySpanExporter::default();
        let mut config = NodeConfig::preset(NodePreset::C);
        config.work.delay_ms = 60_000;
        let factory = InMemory { spans: spans.clone() };
        let telemetry = build(&config.service_name, "", &factory).unwrap();
        let root = ExecutionContext::root();
        root.cancel();
        let server = NodeServer::new(&config, telemetry, root).unwrap();

        let response = server
            .router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let finished = spans.get_finished_spans().unwrap();
        assert_eq!(finished.len(), 1);
        assert!(matches!(
            finished[0].status,
            opentelemetry::trace::Status::Error { .. }
        ));
    }
}
