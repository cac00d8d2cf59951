//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a chain node.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OTLP/gRPC collector address.
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Environment variable that overrides the exporter endpoint.
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Root configuration for one service node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Service identity reported in telemetry and responses.
    pub service_name: String,

    /// Human-readable message placed in successful responses.
    pub message: String,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Next node in the chain. `None` makes this node terminal.
    pub downstream: Option<DownstreamConfig>,

    /// Local work performed by a terminal node.
    pub work: WorkConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Exporter settings.
    pub telemetry: TelemetryConfig,

    /// Startup/shutdown settings.
    pub lifecycle: LifecycleConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::preset(NodePreset::C)
    }
}

/// Built-in node identities of the A → B → C chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePreset {
    A,
    B,
    C,
}

impl NodeConfig {
    /// Build the configuration for one of the built-in chain nodes.
    pub fn preset(preset: NodePreset) -> Self {
        let (service_name, port, message, downstream) = match preset {
            NodePreset::A => (
                "app-a",
                8080,
                "called app-b successfully",
                Some(DownstreamConfig {
                    name: "app-b".to_string(),
                    url: "http://localhost:8081".to_string(),
                    url_env: Some("APP_B_URL".to_string()),
                }),
            ),
            NodePreset::B => (
                "app-b",
                8081,
                "called app-c successfully",
                Some(DownstreamConfig {
                    name: "app-c".to_string(),
                    url: "http://localhost:8082".to_string(),
                    url_env: Some("APP_C_URL".to_string()),
                }),
            ),
            NodePreset::C => ("app-c", 8082, "final response from app-c", None),
        };

        Self {
            service_name: service_name.to_string(),
            message: message.to_string(),
            listener: ListenerConfig {
                bind_address: format!("0.0.0.0:{}", port),
            },
            downstream,
            work: WorkConfig::default(),
            timeouts: TimeoutConfig::default(),
            telemetry: TelemetryConfig::default(),
            lifecycle: LifecycleConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }

    /// Whether this node answers directly instead of forwarding.
    pub fn is_terminal(&self) -> bool {
        self.downstream.is_none()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8082".to_string(),
        }
    }
}

/// The next node a forwarding node calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownstreamConfig {
    /// Service name of the next node, used in log lines and span attributes.
    pub name: String,

    /// Base URL of the next node; requests go to its root path.
    pub url: String,

    /// Environment variable that overrides `url` when set and non-empty.
    #[serde(default)]
    pub url_env: Option<String>,
}

/// Emulated work of the terminal node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkConfig {
    /// How long the local work takes, in milliseconds.
    pub delay_ms: u64,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self { delay_ms: 100 }
    }
}

impl WorkConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for one downstream call, in seconds.
    pub downstream_secs: u64,

    /// Total time allowed to produce a response, in seconds.
    pub request_secs: u64,

    /// Time a client has to send the request head, in seconds.
    pub read_header_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            downstream_secs: 5,
            request_secs: 10,
            read_header_secs: 1,
        }
    }
}

impl TimeoutConfig {
    pub fn downstream(&self) -> Duration {
        Duration::from_secs(self.downstream_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn read_header(&self) -> Duration {
        Duration::from_secs(self.read_header_secs)
    }
}

/// Telemetry exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// OTLP/gRPC collector endpoint for traces.
    pub otlp_endpoint: String,

    /// Batch window of the span processor, in milliseconds.
    pub trace_batch_delay_ms: u64,

    /// Export interval of the periodic metric reader, in seconds.
    pub metric_interval_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            trace_batch_delay_ms: 1000,
            metric_interval_secs: 3,
        }
    }
}

/// Process lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Upper bound for the graceful drain in seconds. `0` waits indefinitely.
    pub drain_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}

impl LifecycleConfig {
    pub fn drain_timeout(&self) -> Option<Duration> {
        match self.drain_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Console log format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
