//! Three-node service chain (A → B → C) instrumented with OpenTelemetry.

pub mod chain;
pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::NodeConfig;
pub use context::ExecutionContext;
pub use http::NodeServer;
pub use lifecycle::{Controller, LifecycleError};
pub use observability::Telemetry;
