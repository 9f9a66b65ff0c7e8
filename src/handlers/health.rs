use std::sync::Arc;
use axum::{extract::State, http::StatusCode, Json};
use crate::models::{HealthResponse, ReadyResponse};
use crate::ws::Hub;
use tracing::{debug, warn};

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint, reports whether the document store answers.
pub async fn ready_check(State(hub): State<Arc<Hub>>) -> (StatusCode, Json<ReadyResponse>) {
    debug!("Readiness check requested");
    let store = hub.store().name().to_string();
    match hub.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ok".to_string(),
                message: "Service is ready".to_string(),
                store,
            }),
        ),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "unavailable".to_string(),
                    message: format!("Document store unavailable: {}", e),
                    store,
                }),
            )
        }
    }
}
