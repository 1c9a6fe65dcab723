//! CORS and request logging layers.
use axum::middleware::Next;
use axum::{body::Body, http::Request, response::Response};
use std::time::Instant;
use tower_http::cors::CorsLayer;

use sitesmith_core::millis;

pub fn cors() -> CorsLayer {
    CorsLayer::permissive()
}

/// Logs method, path, status and latency for every request.
pub async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = millis(start.elapsed()),
        "request handled"
    );
    response
}
