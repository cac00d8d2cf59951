//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Build telemetry → Install logging → Bind listener
//!
//! Run (controller.rs):
//!     Starting → Listening → Draining | Failed → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → interrupt token → graceful drain
//!     second SIGTERM/SIGINT → immediate exit
//!
//! Shutdown (shutdown.rs):
//!     Registered teardowns → run once, in order → merged error
//! ```
//!
//! # Design Decisions
//! - Ordered startup: telemetry first, then listener (traffic only when ready)
//! - Ordered shutdown: stop accept, drain, cancel in-flight work, flush telemetry
//! - Drain has a timeout: remaining connections are abandoned after the deadline

pub mod controller;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use controller::{Controller, LifecycleError, LifecycleState};
pub use shutdown::{ShutdownError, ShutdownRegistry, TeardownFailure};
pub use signals::interrupt_token;
