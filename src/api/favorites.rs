//! Favorites API endpoints (all require auth)
//!
//! - GET /api/v1/favorites
//! - POST/DELETE /api/v1/favorites/{listing_id}
//! - GET /api/v1/favorites/check/{listing_id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::common::{MessageResponse, Pagination};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{FavoriteWithListing, ListingStatus};

#[derive(Debug, Serialize)]
pub struct FavoriteListingSummary {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub city: String,
    pub status: ListingStatus,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub owner_name: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub id: i64,
    pub listing_id: i64,
    pub created_at: DateTime<Utc>,
    pub listing: FavoriteListingSummary,
}

impl From<FavoriteWithListing> for FavoriteResponse {
    fn from(row: FavoriteWithListing) -> Self {
        Self {
            id: row.id,
            listing_id: row.listing_id,
            created_at: row.created_at,
            listing: FavoriteListingSummary {
                id: row.listing_id,
                title: row.title,
                description: row.description,
                price: row.price,
                city: row.city,
                status: row.listing_status,
                listing_type: row.listing_type,
                is_featured: row.is_featured,
                created_at: row.listing_created_at,
                owner_name: row.owner_name,
                image_url: row.image_url,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddedResponse {
    pub message: &'static str,
    pub favorite_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub is_favorite: bool,
}

/// Build the favorites router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_favorites))
        .route("/{listing_id}", post(add_favorite).delete(remove_favorite))
        .route("/check/{listing_id}", get(check_favorite))
}

/// GET /api/v1/favorites
async fn list_favorites(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<FavoriteResponse>>, ApiError> {
    let (offset, limit) = page.validate()?;
    let favorites = state
        .favorite_service
        .list(user.0.id, offset, limit)
        .await?;
    Ok(Json(favorites.into_iter().map(FavoriteResponse::from).collect()))
}

/// POST /api/v1/favorites/{listing_id}
async fn add_favorite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(listing_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let favorite = state.favorite_service.add(user.0.id, listing_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(AddedResponse {
            message: "Added to favorites",
            favorite_id: favorite.id,
        }),
    ))
}

/// DELETE /api/v1/favorites/{listing_id}
async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(listing_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.favorite_service.remove(user.0.id, listing_id).await?;
    Ok(Json(MessageResponse::new("Removed from favorites")))
}

/// GET /api/v1/favorites/check/{listing_id}
async fn check_favorite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(listing_id): Path<i64>,
) -> Result<Json<CheckResponse>, ApiError> {
    let is_favorite = state
        .favorite_service
        .is_favorite(user.0.id, listing_id)
        .await?;
    Ok(Json(CheckResponse { is_favorite }))
}
