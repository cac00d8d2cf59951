//! Request metrics middleware.
//! Records count and latency for every routed request.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics::NodeMetrics;

pub async fn track_metrics(
    State(metrics): State<NodeMetrics>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // Matched route, not the raw path, to keep attribute cardinality bounded.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(req).await;
    metrics.record_request(&method, &route, response.status().as_u16(), start);
    response
}
