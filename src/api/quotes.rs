//! Quote request API endpoints
//!
//! - POST /api/v1/quotes - Public lead form (rate limited per IP)
//! - GET /api/v1/quotes - Admin list with `status_filter` / `city_filter`
//! - GET /api/v1/quotes/stats - Admin counters
//! - GET/DELETE /api/v1/quotes/{id}
//! - PATCH /api/v1/quotes/{id}/status

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_limit, default_skip, validate_page};
use crate::api::middleware::{check_lead_limit, ApiError, AppState, ClientIp};
use crate::models::{QuoteRequest, QuoteStatus};
use crate::services::quote::{QuoteInput, QuoteStats};

#[derive(Debug, Deserialize)]
pub struct QuoteListQuery {
    pub status_filter: Option<QuoteStatus>,
    pub city_filter: Option<String>,
    #[serde(default = "default_skip")]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuoteStatusUpdate {
    pub status: QuoteStatus,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuoteUpdatedResponse {
    pub message: &'static str,
    pub quote: QuoteRequest,
}

#[derive(Debug, Serialize)]
pub struct QuoteDeletedResponse {
    pub message: &'static str,
    pub quote_id: i64,
}

/// Build public quote routes
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(create_quote))
}

/// Build admin quote routes (requires auth and admin middleware)
pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_quotes))
        .route("/stats", get(quote_stats))
        .route("/{id}", get(get_quote).delete(delete_quote))
        .route("/{id}/status", patch(update_quote_status))
}

/// POST /api/v1/quotes
async fn create_quote(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(body): Json<QuoteInput>,
) -> Result<impl IntoResponse, ApiError> {
    check_lead_limit(&state, ip).await?;
    let quote = state.quote_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

/// GET /api/v1/quotes
async fn list_quotes(
    State(state): State<AppState>,
    Query(query): Query<QuoteListQuery>,
) -> Result<Json<Vec<QuoteRequest>>, ApiError> {
    let (offset, limit) = validate_page(query.skip, query.limit)?;
    let quotes = state
        .quote_service
        .list(query.status_filter, query.city_filter.as_deref(), offset, limit)
        .await?;
    Ok(Json(quotes))
}

/// GET /api/v1/quotes/stats
async fn quote_stats(State(state): State<AppState>) -> Result<Json<QuoteStats>, ApiError> {
    Ok(Json(state.quote_service.stats().await?))
}

/// GET /api/v1/quotes/{id}
async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<QuoteRequest>, ApiError> {
    Ok(Json(state.quote_service.get(id).await?))
}

/// PATCH /api/v1/quotes/{id}/status
async fn update_quote_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<QuoteStatusUpdate>,
) -> Result<Json<QuoteUpdatedResponse>, ApiError> {
    let quote = state
        .quote_service
        .update_status(id, body.status, body.admin_notes)
        .await?;
    Ok(Json(QuoteUpdatedResponse {
        message: "Quote request status updated successfully",
        quote,
    }))
}

/// DELETE /api/v1/quotes/{id}
async fn delete_quote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<QuoteDeletedResponse>, ApiError> {
    state.quote_service.delete(id).await?;
    Ok(Json(QuoteDeletedResponse {
        message: "Quote request deleted successfully",
        quote_id: id,
    }))
}
