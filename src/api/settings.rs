//! Site settings API endpoints
//!
//! - GET /api/v1/settings/public - Public settings
//! - GET /api/v1/settings/{key} - One public setting
//! - GET /api/v1/settings - All settings (admin)
//! - PUT /api/v1/settings/{key} - Upsert (admin)
//! - POST /api/v1/settings/init-defaults - Seed defaults (admin)

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::services::settings::{SettingUpdate, SettingView};

#[derive(Debug, Serialize)]
pub struct InitDefaultsResponse {
    pub message: String,
    pub created: usize,
}

/// Build public settings routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/public", get(public_settings))
        .route("/{key}", get(get_setting))
}

/// Build admin settings routes (requires auth and admin middleware)
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(all_settings))
        .route("/{key}", put(update_setting))
        .route("/init-defaults", post(init_defaults))
}

/// GET /api/v1/settings/public
async fn public_settings(State(state): State<AppState>) -> Result<Json<Vec<SettingView>>, ApiError> {
    Ok(Json(state.settings_service.list_public().await?))
}

/// GET /api/v1/settings/{key}
async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SettingView>, ApiError> {
    Ok(Json(state.settings_service.get_public(&key).await?))
}

/// GET /api/v1/settings
async fn all_settings(State(state): State<AppState>) -> Result<Json<Vec<SettingView>>, ApiError> {
    Ok(Json(state.settings_service.list_all().await?))
}

/// PUT /api/v1/settings/{key}
async fn update_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SettingUpdate>,
) -> Result<Json<SettingView>, ApiError> {
    Ok(Json(state.settings_service.upsert(&key, body).await?))
}

/// POST /api/v1/settings/init-defaults
async fn init_defaults(
    State(state): State<AppState>,
) -> Result<Json<InitDefaultsResponse>, ApiError> {
    let created = state.settings_service.init_defaults().await?;
    Ok(Json(InitDefaultsResponse {
        message: format!("Initialized {} default settings", created),
        created,
    }))
}
