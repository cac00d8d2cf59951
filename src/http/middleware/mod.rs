//! Router middleware specific to chain nodes.
//!
//! Generic concerns (timeouts, request IDs, HTTP trace logs) come from
//! tower-http and are stacked in `server.rs`.

pub mod metrics;

pub use metrics::track_metrics;
