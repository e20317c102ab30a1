//! Contact API endpoints
//!
//! - POST /api/v1/contact - Public contact form (rate limited per IP)
//! - GET /api/v1/contact - Admin inbox
//! - PATCH /api/v1/contact/{id} - Admin follow-up

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_limit, default_skip, validate_page};
use crate::api::middleware::{check_lead_limit, ApiError, AppState, ClientIp};
use crate::models::{ContactMessage, ContactStatus};
use crate::services::contact::ContactInput;

#[derive(Debug, Deserialize)]
pub struct ContactListQuery {
    pub status: Option<ContactStatus>,
    #[serde(default = "default_skip")]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct ContactStatusUpdate {
    pub status: ContactStatus,
    pub admin_notes: Option<String>,
}

/// Build public contact routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(create_message))
}

/// Build admin contact routes (requires auth and admin middleware)
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_messages))
        .route("/{id}", patch(update_message))
}

/// POST /api/v1/contact
async fn create_message(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(body): Json<ContactInput>,
) -> Result<impl IntoResponse, ApiError> {
    check_lead_limit(&state, ip).await?;
    let message = state.contact_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /api/v1/contact
async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<ContactListQuery>,
) -> Result<Json<Vec<ContactMessage>>, ApiError> {
    let (offset, limit) = validate_page(query.skip, query.limit)?;
    let messages = state
        .contact_service
        .list(query.status, offset, limit)
        .await?;
    Ok(Json(messages))
}

/// PATCH /api/v1/contact/{id}
async fn update_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ContactStatusUpdate>,
) -> Result<Json<ContactMessage>, ApiError> {
    let message = state
        .contact_service
        .update_status(id, body.status, body.admin_notes)
        .await?;
    Ok(Json(message))
}
