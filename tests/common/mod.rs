//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use opentelemetry_sdk::logs::{InMemoryLogExporter, SdkLoggerProvider};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
use opentelemetry_sdk::Resource;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use otel_chain::config::{DownstreamConfig, NodeConfig, NodePreset};
use otel_chain::lifecycle::{Controller, LifecycleError, LifecycleState};
use otel_chain::observability::{ExporterFactory, PipelineError};

/// Exporters that keep everything in memory. Clones share the span store
/// and the list of tracer providers handed out.
#[derive(Clone, Default)]
pub struct InMemoryExporters {
    pub spans: InMemorySpanExporter,
    tracers: Arc<Mutex<Vec<SdkTracerProvider>>>,
}

impl InMemoryExporters {
    pub fn finished(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap()
    }

    pub fn named(&self, name: &str) -> Vec<SpanData> {
        self.finished()
            .into_iter()
            .filter(|span| span.name == name)
            .collect()
    }

    /// Number of tracer providers built from this factory.
    pub fn tracers_built(&self) -> usize {
        self.tracers.lock().unwrap().len()
    }

    /// Whether every tracer provider built so far has been shut down.
    /// A second shutdown of a stopped provider reports an error.
    pub fn tracers_shut_down(&self) -> bool {
        self.tracers
            .lock()
            .unwrap()
            .iter()
            .all(|provider| provider.shutdown().is_err())
    }
}

impl ExporterFactory for InMemoryExporters {
    fn tracer_provider(&self, resource: Resource, _endpoint: &str) -> Result<SdkTracerProvider, PipelineError> {
        let provider = SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(self.spans.clone())
            .build();
        self.tracers.lock().unwrap().push(provider.clone());
        Ok(provider)
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

/// Node preset bound to loopback, forwarding to `downstream` when given.
pub fn node_config(preset: NodePreset, downstream: Option<SocketAddr>) -> NodeConfig {
    let mut config = NodeConfig::preset(preset);
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.work.delay_ms = 10;
    config.lifecycle.drain_timeout_secs = 5;
    if let (Some(link), Some(addr)) = (config.downstream.as_mut(), downstream) {
        link.url = format!("http://{addr}");
        link.url_env = None;
    }
    config
}

/// Forwarding config pointing at an arbitrary address.
pub fn forwarding_config(name: &str, target: SocketAddr) -> NodeConfig {
    let mut config = node_config(NodePreset::A, None);
    config.downstream = Some(DownstreamConfig {
        name: name.to_string(),
        url: format!("http://{target}"),
        url_env: None,
    });
    config
}

pub struct RunningNode {
    pub addr: SocketAddr,
    pub interrupt: CancellationToken,
    pub handle: JoinHandle<(LifecycleState, Result<(), LifecycleError>)>,
}

impl RunningNode {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Interrupt the node and wait for its controller to finish.
    pub async fn stop(self) -> (LifecycleState, Result<(), LifecycleError>) {
        self.interrupt.cancel();
        self.handle.await.unwrap()
    }
}

/// Run a node on a fresh loopback port with the given exporters.
pub async fn spawn_node(config: NodeConfig, exporters: InMemoryExporters) -> RunningNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let interrupt = CancellationToken::new();

    let mut controller = Controller::new(config, interrupt.clone())
        .with_exporters(exporters)
        .with_listener(listener)
        .install_logging(false);

    let handle = tokio::spawn(async move {
        let result = controller.run().await;
        (controller.state(), result)
    });

    wait_until_healthy(addr).await;
    RunningNode {
        addr,
        interrupt,
        handle,
    }
}

async fn wait_until_healthy(addr: SocketAddr) {
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if let Ok(res) = client.get(format!("http://{addr}/health")).send().await {
            if res.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("node at {addr} never became healthy");
}

/// An address nothing listens on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start a mock downstream that answers every request with `body` and
/// records the raw request heads it received.
pub async fn start_mock_backend(body: &'static str) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let record = record.clone();
                    tokio::spawn(async move {
                        let head = read_request_head(&mut socket).await;
                        record.lock().unwrap().push(head);

                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen)
}

/// Start a downstream that reads requests but never answers. Each time a
/// peer closes its connection, a message is sent on the returned channel.
pub async fn start_silent_backend() -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
                let _ = closed_tx.send(());
            });
        }
    });

    (addr, closed_rx)
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).to_lowercase()
}
