//! Response bodies and the handler error boundary.
//!
//! # Responsibilities
//! - JSON bodies for `GET /` (forwarding and terminal variants)
//! - Convert handler failures into a 500 with a plain-text message
//!
//! # Design Decisions
//! - Only the immediate error string is exposed to clients
//! - Decode and transport failures share the status code but keep their
//!   own variants in `ForwardError`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::chain::downstream::ForwardError;
use crate::resilience::timeouts::Interrupted;

/// Body of a forwarding node: its own identity wrapping the next node's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardResult {
    pub service: String,
    pub message: String,
    pub result: Map<String, Value>,
}

/// Body of the terminal node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalPayload {
    pub service: String,
    pub message: String,
    pub status: String,
}

pub const SUCCESS: &str = "success";

/// Failure of a `GET /` request.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("local work interrupted: {0}")]
    Work(#[from] Interrupted),
}

impl NodeError {
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_forward_result_shape() {
        let inner = serde_json::json!({
            "service": "app-c",
            "message": "final response from app-c",
            "status": "success",
        });
        let body = ForwardResult {
            service: "app-b".into(),
            message: "called app-c successfully".into(),
            result: inner.as_object().unwrap().clone(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["result"]["status"], "success");
        assert_eq!(json["service"], "app-b");
    }

    #[tokio::test]
    async fn test_errors_become_plain_text_500() {
        let response = NodeError::from(ForwardError::Timeout(Duration::from_secs(5))).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"downstream call timed out after 5s");
    }
}
