//! Chain behavior of a node.
//!
//! # Data Flow
//! ```text
//! handle_root
//!     → forwarding node: downstream.rs (GET / on the next node, context injected)
//!     → terminal node:   work.rs (bounded local delay)
//! ```

pub mod downstream;
pub mod work;

pub use downstream::{Downstream, DownstreamReply, ForwardError};
pub use work::LocalWork;

/// What a node does with a request after opening its span.
#[derive(Debug, Clone)]
pub enum NodeRole {
    /// Call the next node and wrap its payload.
    Forward(Downstream),
    /// Do local work and answer directly.
    Terminal(LocalWork),
}
