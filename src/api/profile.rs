//! Profile API endpoints
//!
//! - GET/PUT/DELETE /api/v1/profile/me
//! - GET /api/v1/profile/my-listings

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::api::common::{MessageResponse, Pagination};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ListingWithOwner, User};
use crate::services::user::ProfileUpdate;

/// Build the profile router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_profile).put(update_profile).delete(delete_account))
        .route("/my-listings", get(my_listings))
}

/// GET /api/v1/profile/me
async fn get_profile(user: AuthenticatedUser) -> Json<User> {
    Json(user.0)
}

/// PUT /api/v1/profile/me
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    let user = state.user_service.update_profile(user.0, body).await?;
    Ok(Json(user))
}

/// GET /api/v1/profile/my-listings
///
/// Every status, with the number of images per listing.
async fn my_listings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<ListingWithOwner>>, ApiError> {
    let (offset, limit) = page.validate()?;
    let listings = state
        .listing_service
        .list_owned(user.0.id, offset, limit)
        .await?;
    Ok(Json(listings))
}

/// DELETE /api/v1/profile/me
///
/// Rows cascade in the database; media directories are removed afterwards.
async fn delete_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let listing_ids = state.listing_service.owned_ids(user.0.id).await?;
    state.user_service.delete_account(user.0.id).await?;

    for listing_id in listing_ids {
        if let Err(e) = state.image_service.remove_listing_dir(listing_id).await {
            tracing::warn!(listing_id, "Failed to remove listing media: {}", e);
        }
    }

    Ok(Json(MessageResponse::new("Account deleted successfully")))
}
