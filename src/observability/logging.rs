//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber
//! - Print log events to the console (pretty or JSON)
//! - Bridge log events into the telemetry log pipeline
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - The exporter stack's own crates never reach the log pipeline, so an
//!   export failure cannot feed back into another export

use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::schema::{LogFormat, ObservabilityConfig};
use crate::observability::pipeline::Telemetry;

const BRIDGE_EXCLUDED: &[&str] = &["opentelemetry", "tonic", "h2", "hyper", "tower", "reqwest"];

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("failed to install log subscriber: {0}")]
    Install(#[from] TryInitError),
}

/// Default directives when `RUST_LOG` is unset.
pub fn default_directives(level: &str) -> String {
    format!("otel_chain={level},chain_node={level},tower_http={level}")
}

fn bridge_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let mut directives = vec![level.to_string()];
    directives.extend(BRIDGE_EXCLUDED.iter().map(|target| format!("{target}=off")));
    Ok(EnvFilter::try_new(directives.join(","))?)
}

/// Install the process-wide `tracing` subscriber.
///
/// Fails instead of panicking when a subscriber is already installed.
pub fn init_logging(config: &ObservabilityConfig, telemetry: &Telemetry) -> Result<(), LoggingError> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&config.log_level))?,
    };

    let bridge = OpenTelemetryTracingBridge::new(telemetry.logger_provider())
        .with_filter(bridge_filter(&config.log_level)?);

    let console = match config.log_format {
        LogFormat::Json => fmt::layer().json().with_filter(console_filter).boxed(),
        LogFormat::Pretty => fmt::layer().with_filter(console_filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(bridge)
        .try_init()?;

    tracing::info!(
        service = %telemetry.service_name(),
        log_format = ?config.log_format,
        "logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_filter_silences_exporter_crates() {
        let filter = bridge_filter("info").unwrap().to_string();
        for target in BRIDGE_EXCLUDED {
            assert!(filter.contains(&format!("{target}=off")));
        }
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        assert!(matches!(bridge_filter("info,chain=notalevel"), Err(LoggingError::Filter(_))));
    }
}
