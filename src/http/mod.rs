//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (add or keep request ID)
//!     → middleware/metrics.rs (count and time the request)
//!     → handlers.rs (span, forward or local work)
//!     → response.rs (JSON body or plain-text 500)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ForwardResult, NodeError, TerminalPayload};
pub use server::{NodeServer, NodeState};
