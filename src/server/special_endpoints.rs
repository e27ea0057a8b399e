//! Special endpoint handlers for the server.
//!
//! Functions return `EndpointResponse` instead of writing directly to the
//! session. This keeps response generation testable; the caller handles
//! writing the response out.

use std::time::Instant;

use crate::metrics::Metrics;

/// Response from a special endpoint handler.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl EndpointResponse {
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    /// Plain text response for Prometheus metrics.
    pub fn prometheus(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; version=0.0.4",
            body,
        }
    }
}

/// Generate response for the /health endpoint.
pub fn handle_health(start_time: Instant) -> EndpointResponse {
    let uptime_seconds = start_time.elapsed().as_secs();
    let version = env!("CARGO_PKG_VERSION");

    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": uptime_seconds,
        "version": version
    })
    .to_string();

    EndpointResponse::json(200, body)
}

/// Generate response for the /metrics endpoint.
pub fn handle_metrics(metrics: &Metrics) -> EndpointResponse {
    EndpointResponse::prometheus(metrics.export_prometheus())
}
