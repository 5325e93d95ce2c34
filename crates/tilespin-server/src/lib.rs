pub mod api;
pub mod assets;
pub mod config;
pub mod error;
pub mod fanout;
pub mod health;
pub mod session_manager;
pub mod state;
pub mod ws;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use config::ServerConfig;
use session_manager::SessionManager;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    build_app_with(config, SessionManager::new())
}

/// Like [`build_app`], around a caller-supplied session manager.
pub fn build_app_with(config: ServerConfig, manager: SessionManager) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let asset_prefix = config.assets.public_prefix.clone();
    let max_upload = config.assets.max_upload_bytes;
    let state = AppState::with_manager(config, manager);

    let upload_routes = Router::new()
        .route("/assets", post(api::upload_asset))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload));

    let api_routes = Router::new()
        .route("/status", get(api::get_status))
        .merge(upload_routes);

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes)
        .nest_service(&asset_prefix, ServeDir::new(state.assets.dir()))
        .fallback_service(ServeDir::new(&web_root))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (app, state)
}
