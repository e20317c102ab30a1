//! Root and health endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub app_name: String,
    pub version: &'static str,
    pub debug_mode: bool,
    pub database: &'static str,
}

/// Routes mounted at the server root
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

/// GET /
async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    Json(RootResponse {
        message: format!("Welcome to {}", state.config.app.name),
        version: state.config.app.version(),
        status: "operational",
    })
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.pool.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            "unavailable"
        }
    };
    Json(HealthResponse {
        status: "healthy",
        app_name: state.config.app.name.clone(),
        version: state.config.app.version(),
        debug_mode: state.config.app.is_debug(),
        database,
    })
}
