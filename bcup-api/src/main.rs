//! bcup backup service
//!
//! HTTP front for listing, creating, deleting, restoring and downloading
//! per-project backup files.

mod api;
mod config;
mod errors;
mod rate_limit;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use bcup_core::observability::{init_observability, BcupMetrics};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use rate_limit::RateLimiter;

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'none'; connect-src 'self'; frame-ancestors 'none'; base-uri 'none'; form-action 'none'";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let limiter = RateLimiter::new(config.rate_limit, config.rate_window);
        Self {
            config: Arc::new(config),
            limiter: Arc::new(limiter),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    init_observability(&config.log_level, config.log_json)?;

    tracing::info!("Starting bcup backup service");
    tracing::info!("Backup directory: {:?}", config.backup.backup_dir);
    tracing::info!("Bind address: {}", config.bind_addr);
    if config.rate_limit == 0 {
        tracing::warn!("Rate limiting disabled (BCUP_RATE_LIMIT=0)");
    }

    let bind_addr = config.bind_addr;
    let app = create_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/backups", get(api::list_backups).post(api::create_backup))
        .route("/backups/delete", post(api::delete_backup))
        .route("/backups/restore", post(api::restore_backup))
        .route("/backups/download", get(api::download_backup))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit::rate_limit_layer,
        ));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CONTENT_SECURITY_POLICY,
                    HeaderValue::from_static(CONTENT_SECURITY_POLICY),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::STRICT_TRANSPORT_SECURITY,
                    HeaderValue::from_static("max-age=31536000; includeSubDomains; preload"),
                )),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Prometheus scrape endpoint.
async fn metrics() -> impl IntoResponse {
    let gathered = BcupMetrics::global()
        .ok_or_else(|| "metrics unavailable".to_string())
        .and_then(|metrics| metrics.gather_metrics().map_err(|e| e.to_string()));

    match gathered {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            e,
        ),
    }
}
