mod models;
mod handlers;
mod routes;
mod docs;
mod config;
mod db;
mod utils;
mod websocket;
mod ws;

use std::panic;
use std::sync::Arc;
use config::Config;
use db::{DocStore, memstore::MemoryDocStore, pgstore::PgDocStore};
use routes::create_app;
use tracing::{info, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use ws::Hub;

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Load configuration before logging so LOG_LEVEL can seed the filter
    let config_result = Config::load();
    let config = config_result.as_ref().cloned().unwrap_or_default();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .init();

    info!("Starting {} ({})...", config.cloud_service_name, config.environment);
    match &config_result {
        Ok(_) => info!("✅ Configuration loaded successfully"),
        Err(e) => {
            error!("❌ Failed to load configuration: {}", e);
            warn!("Using default configuration");
        }
    }
    if config.is_development() {
        info!("Running in development mode");
    }

    // Pick the document store
    let store: Arc<dyn DocStore> = match &config.db_url {
        Some(db_url) => match connect_postgres(db_url, config.db_max_connections).await {
            Ok(store) => {
                info!("Database initialized successfully");
                Arc::new(store)
            }
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                warn!("Falling back to in-memory storage - documents will not survive a restart");
                Arc::new(MemoryDocStore::new())
            }
        },
        None => {
            warn!("No database URL configured - documents will not survive a restart");
            Arc::new(MemoryDocStore::new())
        }
    };

    let hub = Hub::new(store, config.sync_settings());
    let app_routes = create_app(hub, &config);

    // Start the HTTP/WebSocket server
    let listener = tokio::net::TcpListener::bind(config.server_address())
        .await
        .unwrap_or_else(|_| panic!("Failed to bind to {}", config.server_address()));

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/ws", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    axum::serve(listener, app_routes)
        .await
        .expect("Server failed to start");
}

async fn connect_postgres(db_url: &str, max_connections: u32) -> Result<PgDocStore, sqlx::Error> {
    let store = PgDocStore::new(db_url, max_connections).await?;
    store.init_schema().await?;
    Ok(store)
}
