use axum::Json;
use chrono::Utc;
use crate::models::{HealthResponse, ReadyResponse};
use tracing::debug;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check endpoint
pub async fn ready_check() -> Json<ReadyResponse> {
    debug!("Readiness check requested");
    // All state is in memory, so a running process is a ready one.
    Json(ReadyResponse {
        status: "ok".to_string(),
        message: "Service is ready".to_string(),
    })
}

/// Plain text banner at the root path
pub async fn banner() -> &'static str {
    "CodeSync relay is running"
}
