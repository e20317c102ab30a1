//! Listing API endpoints
//!
//! Handles HTTP requests for listings and their images:
//! - GET /api/v1/listings - Search approved listings (or `owner_id=me`)
//! - GET /api/v1/listings/{id} - Listing details
//! - POST /api/v1/listings - Create a listing (pending review)
//! - PUT /api/v1/listings/{id} - Owner edit, resubmits for review
//! - DELETE /api/v1/listings/{id} - Soft delete
//! - GET/POST /api/v1/listings/{id}/images - List or upload images
//! - DELETE /api/v1/listings/{id}/images/{image_id} - Remove an image

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_limit, default_skip, validate_page};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::models::{Listing, ListingImage};
use crate::services::image::ImageUpload;
use crate::services::listing::{ListingFilters, ListingInput, ListingPatch, OwnerFilter};

/// Query parameters for the public search
#[derive(Debug, Deserialize)]
pub struct ListingSearchQuery {
    pub city: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub is_featured: Option<bool>,
    /// `me` or a numeric owner id
    pub owner_id: Option<String>,
    #[serde(default = "default_skip")]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub message: &'static str,
    pub listing_id: i64,
}

/// Build public listing routes (optional auth)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(search_listings))
        .route("/{id}", get(get_listing))
        .route("/{id}/images", get(list_images))
}

/// Build protected listing routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_listing))
        .route("/{id}", put(update_listing).delete(delete_listing))
        .route("/{id}/images", post(upload_images))
        .route("/{id}/images/{image_id}", delete(delete_image))
}

/// GET /api/v1/listings
async fn search_listings(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(query): Query<ListingSearchQuery>,
) -> Result<Json<Vec<Listing>>, ApiError> {
    let (offset, limit) = validate_page(query.skip, query.limit)?;
    let filters = ListingFilters {
        city: query.city,
        listing_type: query.listing_type,
        min_price: query.min_price,
        max_price: query.max_price,
        is_featured: query.is_featured,
        owner: query.owner_id.as_deref().and_then(OwnerFilter::parse),
    };

    let listings = state
        .listing_service
        .search(filters, viewer.as_ref(), offset, limit)
        .await?;
    Ok(Json(listings))
}

/// GET /api/v1/listings/{id}
async fn get_listing(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Listing>, ApiError> {
    let listing = state.listing_service.get_visible(id, viewer.as_ref()).await?;
    Ok(Json(listing))
}

/// POST /api/v1/listings
async fn create_listing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ListingInput>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state.listing_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

/// PUT /api/v1/listings/{id}
async fn update_listing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ListingPatch>,
) -> Result<Json<Listing>, ApiError> {
    let listing = state.listing_service.update(&user.0, id, body).await?;
    Ok(Json(listing))
}

/// DELETE /api/v1/listings/{id}
async fn delete_listing(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<DeactivateResponse>, ApiError> {
    let listing = state.listing_service.deactivate(&user.0, id).await?;
    Ok(Json(DeactivateResponse {
        message: "Listing marked as inactive",
        listing_id: listing.id,
    }))
}

/// GET /api/v1/listings/{id}/images
async fn list_images(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ListingImage>>, ApiError> {
    state.listing_service.get_visible(id, viewer.as_ref()).await?;
    let images = state.image_service.list(id).await?;
    Ok(Json(images))
}

/// POST /api/v1/listings/{id}/images
///
/// Accepts multipart/form-data with one or more file fields named "files".
async fn upload_images(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    state.listing_service.get_owned(id, &user.0).await?;

    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        uploads.push(ImageUpload {
            file_name,
            content_type,
            data: data.to_vec(),
        });
    }

    let images = state.image_service.store(id, uploads).await?;
    Ok((StatusCode::CREATED, Json(images)))
}

/// DELETE /api/v1/listings/{id}/images/{image_id}
async fn delete_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, image_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state.listing_service.get_owned(id, &user.0).await?;
    state.image_service.delete(id, image_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
