use axum::{
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

use crate::config::AppConfig;
use crate::product_manager::ProductManager;
use crate::scheduler::ScanScheduler;

pub mod handlers;
pub mod responses;

pub use handlers::{
    check_product_price, delete_product, get_product, get_scan_stats, list_products,
    list_supported_sites, run_scan_now, track_product,
};
pub use responses::{ApiError, ApiResponse, Error};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ProductManager>,
    pub scheduler: Arc<tokio::sync::Mutex<ScanScheduler>>,
    pub config: AppConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .nest("/api/v1", api_routes())
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(
                            tower_http::trace::DefaultOnResponse::new().level(Level::INFO),
                        ),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Tracked products
        .route("/products", get(list_products).post(track_product))
        .route("/products/:id", get(get_product).delete(delete_product))
        .route("/products/:id/check", post(check_product_price))
        // Supported-site registry
        .route("/sites", get(list_supported_sites))
        // Scan management
        .route("/scheduler/stats", get(get_scan_stats))
        .route("/scheduler/scan", post(run_scan_now))
}

// Health check endpoint
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "pricewarden"
    }))
}

pub async fn serve(config: AppConfig, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
            .await?;

    tracing::info!(
        "Server starting on {}:{}",
        config.server.host,
        config.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
