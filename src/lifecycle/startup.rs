//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the telemetry pipelines for the node
//! - Install the process-wide log subscriber
//! - Bind the listener when none was supplied
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last (traffic only when ready)

use tokio::net::TcpListener;

use crate::config::NodeConfig;
use crate::lifecycle::controller::LifecycleError;
use crate::observability::{self, ExporterFactory, Telemetry};

/// Build the node's pipelines on a blocking thread.
///
/// A failed build shuts down the pipelines it already started, which
/// blocks while they flush.
pub async fn build_telemetry<F>(config: &NodeConfig, exporters: &F) -> Result<Telemetry, LifecycleError>
where
    F: ExporterFactory + Clone + Send + 'static,
{
    let service_name = config.service_name.clone();
    let endpoint = config.telemetry.otlp_endpoint.clone();
    let exporters = exporters.clone();

    let telemetry = tokio::task::spawn_blocking(move || {
        observability::build(&service_name, &endpoint, &exporters)
    })
    .await??;
    Ok(telemetry)
}

pub fn install_logging(config: &NodeConfig, telemetry: &Telemetry) -> Result<(), LifecycleError> {
    observability::init_logging(&config.observability, telemetry)?;
    Ok(())
}

/// Report the configured pipelines once a subscriber can see it.
pub fn log_telemetry(config: &NodeConfig, telemetry: &Telemetry) {
    tracing::info!(
        service = %telemetry.service_name(),
        endpoint = %observability::normalize_endpoint(&config.telemetry.otlp_endpoint),
        "telemetry pipelines configured"
    );
}

pub async fn bind_listener(address: &str) -> Result<TcpListener, LifecycleError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| LifecycleError::Bind {
            address: address.to_string(),
            source,
        })?;

    if let Ok(local) = listener.local_addr() {
        tracing::info!(address = %local, "Listening for connections");
    }
    Ok(listener)
}
