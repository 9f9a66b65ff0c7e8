use crate::{handlers::{diagnostics, health_check, ready_check}, ws::Hub};
use axum::{routing::get, Router};
use std::sync::Arc;

/// Create API routes
pub fn create_api_routes() -> Router<Arc<Hub>> {
    Router::<Arc<Hub>>::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/v1/diagnostics", get(diagnostics))
}
