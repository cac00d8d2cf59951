//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{NodeConfig, OTLP_ENDPOINT_ENV};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Encode error: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Keys missing from the file keep the values of `base`.
pub fn load_config(path: &Path, base: &NodeConfig) -> Result<NodeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_overlay(&content, base)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse `content` as TOML layered on top of `base`.
pub fn parse_overlay(content: &str, base: &NodeConfig) -> Result<NodeConfig, ConfigError> {
    let mut merged = toml::Value::try_from(base)?;
    let overlay: toml::Value = toml::from_str(content)?;
    merge_values(&mut merged, overlay);
    Ok(merged.try_into()?)
}

fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply environment overrides using the process environment.
pub fn apply_process_env(config: &mut NodeConfig) {
    apply_env_overrides(config, |key| std::env::var(key).ok());
}

/// Apply environment overrides read through `lookup`.
///
/// Empty values are ignored so the configured defaults stay in effect.
pub fn apply_env_overrides<F>(config: &mut NodeConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(endpoint) = non_empty(OTLP_ENDPOINT_ENV) {
        config.telemetry.otlp_endpoint = endpoint;
    }

    if let Some(downstream) = config.downstream.as_mut() {
        if let Some(url) = downstream.url_env.as_deref().and_then(|key| non_empty(key)) {
            downstream.url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::NodePreset;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_downstream_and_endpoint() {
        let mut config = NodeConfig::preset(NodePreset::A);
        apply_env_overrides(
            &mut config,
            env(&[
                ("APP_B_URL", "http://app-b:9000"),
                (OTLP_ENDPOINT_ENV, "collector:4317"),
            ]),
        );

        assert_eq!(config.downstream.unwrap().url, "http://app-b:9000");
        assert_eq!(config.telemetry.otlp_endpoint, "collector:4317");
    }

    #[test]
    fn test_empty_env_values_fall_back_to_defaults() {
        let mut config = NodeConfig::preset(NodePreset::B);
        apply_env_overrides(&mut config, env(&[("APP_C_URL", ""), (OTLP_ENDPOINT_ENV, " ")]));

        assert_eq!(config.downstream.unwrap().url, "http://localhost:8082");
        assert_eq!(config.telemetry.otlp_endpoint, "http://localhost:4317");
    }

    #[test]
    fn test_overlay_keeps_unspecified_fields() {
        let base = NodeConfig::preset(NodePreset::A);
        let config = parse_overlay(
            r#"
            service_name = "edge"

            [timeouts]
            downstream_secs = 2
            "#,
            &base,
        )
        .unwrap();

        assert_eq!(config.service_name, "edge");
        assert_eq!(config.timeouts.downstream_secs, 2);
        assert_eq!(config.timeouts.request_secs, 10);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.downstream.is_some());
    }

    #[test]
    fn test_overlay_rejects_malformed_toml() {
        let base = NodeConfig::preset(NodePreset::C);
        let err = parse_overlay("service_name = ", &base).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
