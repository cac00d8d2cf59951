//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to downstream node:
//!     → timeouts.rs (derive call deadline, race against cancellation)
//!     → On failure: error recorded on the span, surfaced as 500
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - The tighter of the inherited and the local deadline wins
//! - No retries: a failed call fails the request

pub mod timeouts;

pub use timeouts::{run_bounded, tighter_deadline, Interrupted};
