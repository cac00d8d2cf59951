//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! preset (a | b | c)
//!     → loader.rs (optional TOML overlay)
//!     → loader.rs (environment overrides)
//!     → validation.rs (semantic checks)
//!     → NodeConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, apply_process_env, load_config, ConfigError};
pub use schema::{
    DownstreamConfig, ListenerConfig, LogFormat, NodeConfig, NodePreset, ObservabilityConfig,
    TelemetryConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
