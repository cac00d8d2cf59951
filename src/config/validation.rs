//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, intervals > 0)
//! - Check that addresses and downstream URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: NodeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::NodeConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service_name must not be empty")]
    EmptyServiceName,
    #[error("invalid bind address `{0}`")]
    InvalidBindAddress(String),
    #[error("downstream `{name}` has invalid url `{url}`")]
    InvalidDownstreamUrl { name: String, url: String },
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

pub fn validate_config(config: &NodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service_name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if let Some(downstream) = &config.downstream {
        let valid = Url::parse(&downstream.url)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidDownstreamUrl {
                name: downstream.name.clone(),
                url: downstream.url.clone(),
            });
        }
    }

    let ranges = [
        ("timeouts.downstream_secs", config.timeouts.downstream_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.read_header_secs", config.timeouts.read_header_secs),
        ("telemetry.trace_batch_delay_ms", config.telemetry.trace_batch_delay_ms),
        ("telemetry.metric_interval_secs", config.telemetry.metric_interval_secs),
    ];
    for (field, value) in ranges {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(field));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
