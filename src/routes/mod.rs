pub mod api;

use axum::http::HeaderValue;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::docs::ApiDoc;
use crate::websocket::websocket_handler;
use crate::ws::Hub;
use api::create_api_routes;

/// Build the full application router: REST API, WebSocket endpoint and Swagger UI.
pub fn create_app(hub: Arc<Hub>, config: &Config) -> Router {
    Router::new()
        // Mount API routes
        .nest("/api", create_api_routes())
        // Real-time sync endpoint
        .route("/ws", get(websocket_handler))
        .with_state(hub)
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(config.cors_origins.as_deref()))
        // Add tracing layer
        .layer(TraceLayer::new_for_http())
}

/// CORS policy from a comma separated origin list. Unset, empty or `*` allows any origin.
pub fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let origins: Vec<&str> = origins
        .unwrap_or("*")
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .collect();

    if origins.is_empty() || origins.contains(&"*") {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}
