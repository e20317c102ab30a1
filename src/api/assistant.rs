//! Listing assistant API endpoints
//!
//! - POST /api/v1/ai/generate-description (public)
//! - POST /api/v1/ai/suggest-price (auth)
//! - POST /api/v1/ai/enhance-listing/{id} (owner)
//! - GET /api/v1/ai/health

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::assistant::{
    enhance_listing, generate_description, suggest_price, DescriptionRequest,
    ListingEnhancement, PriceRequest, PriceSuggestion,
};

#[derive(Debug, Serialize)]
pub struct DescriptionResponse {
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct AssistantHealth {
    pub status: &'static str,
    pub provider: &'static str,
    pub features: Vec<&'static str>,
}

/// Build public assistant routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/generate-description", post(describe))
        .route("/health", get(health))
}

/// Build protected assistant routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/suggest-price", post(price))
        .route("/enhance-listing/{id}", post(enhance))
}

/// POST /api/v1/ai/generate-description
async fn describe(Json(body): Json<DescriptionRequest>) -> Result<Json<DescriptionResponse>, ApiError> {
    if body.title.trim().is_empty() || body.city.trim().is_empty() {
        return Err(ApiError::validation_error("Title and city are required"));
    }
    Ok(Json(DescriptionResponse {
        description: generate_description(&body),
    }))
}

/// POST /api/v1/ai/suggest-price
async fn price(Json(body): Json<PriceRequest>) -> Result<Json<PriceSuggestion>, ApiError> {
    if body.square_footage.is_some_and(|sq_ft| sq_ft < 0) {
        return Err(ApiError::validation_error("square_footage must be zero or positive"));
    }
    Ok(Json(suggest_price(&body)))
}

/// POST /api/v1/ai/enhance-listing/{id}
async fn enhance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ListingEnhancement>, ApiError> {
    let listing = state.listing_service.get_owned(id, &user.0).await?;
    Ok(Json(enhance_listing(&listing)))
}

/// GET /api/v1/ai/health
async fn health() -> Json<AssistantHealth> {
    Json(AssistantHealth {
        status: "available",
        provider: "built-in",
        features: vec!["generate-description", "suggest-price", "enhance-listing"],
    })
}
