//! Health check endpoints
//!
//! - /health, /healthz - Liveness check (is the service running?)
//! - /ready, /readyz - Readiness check (can the graph be read?)

use hyper::StatusCode;
use serde::Serialize;

use super::{json_response, HttpResponse};
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub mode: &'static str,
    /// Storage backend serving the graph
    pub backend: &'static str,
    pub timestamp: String,
}

pub fn health_check(state: &AppState) -> HttpResponse {
    let body = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        mode: if state.args.dev_mode { "development" } else { "production" },
        backend: state.backend,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    json_response(StatusCode::OK, &body)
}

/// 200 once the graph answers a query, 503 otherwise
pub async fn readiness_check(state: &AppState) -> HttpResponse {
    match state.graph.get_role(crate::graph::ADMIN_ROLE_ID).await {
        Ok(_) => json_response(StatusCode::OK, &serde_json::json!({ "ready": true })),
        Err(e) => json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &serde_json::json!({ "ready": false, "error": e.to_string() }),
        ),
    }
}

pub fn version_info() -> HttpResponse {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}
