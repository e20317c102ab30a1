//! Admin API endpoints
//!
//! Everything here sits behind `require_auth` and `require_admin`:
//! - Dashboard counters
//! - User management (edit, ban, unban, suspend)
//! - Listing moderation and featuring
//! - Plan pricing and subscription overview

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_limit, default_skip, validate_page, MessageResponse, Pagination};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    Listing, ListingStatus, ListingWithOwner, Plan, SubscriptionWithNames, User, UserRole,
    UserStatus, UserWithAdsCount,
};
use crate::services::admin::{DashboardStats, UserAdminUpdate};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    #[serde(default = "default_skip")]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListingListQuery {
    pub status: Option<ListingStatus>,
    #[serde(default = "default_skip")]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub status: ListingStatus,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub message: String,
    pub listing: Listing,
}

#[derive(Debug, Deserialize)]
pub struct FeatureQuery {
    pub featured: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct FeatureResponse {
    pub message: &'static str,
    pub is_featured: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlanPriceQuery {
    pub price: f64,
}

#[derive(Debug, Serialize)]
pub struct PlanPriceResponse {
    pub message: &'static str,
    pub new_price: f64,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard/stats", get(dashboard_stats))
        // Users
        .route("/users", get(list_users))
        .route("/users/{id}", get(get_user).put(update_user))
        .route("/users/{id}/ban", post(ban_user))
        .route("/users/{id}/unban", post(unban_user))
        .route("/users/{id}/suspend", post(suspend_user))
        // Listings
        .route("/listings", get(list_listings))
        .route("/listings/{id}", get(get_listing))
        .route("/listings/{id}/review", post(review_listing))
        .route("/listings/{id}/feature", post(feature_listing))
        // Plans and subscriptions
        .route("/plans", get(list_plans))
        .route("/plans/{id}", put(update_plan_price))
        .route("/subscriptions", get(list_subscriptions))
}

// ============================================================================
// Dashboard
// ============================================================================

/// GET /api/v1/admin/dashboard/stats
async fn dashboard_stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.admin_service.dashboard_stats().await?))
}

// ============================================================================
// Users
// ============================================================================

/// GET /api/v1/admin/users
async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserWithAdsCount>>, ApiError> {
    let (offset, limit) = validate_page(query.skip, query.limit)?;
    let users = state
        .admin_service
        .list_users(query.role, query.status, offset, limit)
        .await?;
    Ok(Json(users))
}

/// GET /api/v1/admin/users/{id}
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.admin_service.get_user(id).await?))
}

/// PUT /api/v1/admin/users/{id}
async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UserAdminUpdate>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.admin_service.update_user(id, body).await?))
}

/// POST /api/v1/admin/users/{id}/ban
async fn ban_user(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.admin_service.ban(&admin.0, id).await?;
    Ok(Json(MessageResponse::new("User banned successfully")))
}

/// POST /api/v1/admin/users/{id}/unban
async fn unban_user(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.admin_service.unban(&admin.0, id).await?;
    Ok(Json(MessageResponse::new("User unbanned successfully")))
}

/// POST /api/v1/admin/users/{id}/suspend
async fn suspend_user(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.admin_service.suspend(&admin.0, id).await?;
    Ok(Json(MessageResponse::new("User suspended successfully")))
}

// ============================================================================
// Listings
// ============================================================================

/// GET /api/v1/admin/listings
async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingListQuery>,
) -> Result<Json<Vec<ListingWithOwner>>, ApiError> {
    let (offset, limit) = validate_page(query.skip, query.limit)?;
    let listings = state
        .listing_service
        .admin_list(query.status, offset, limit)
        .await?;
    Ok(Json(listings))
}

/// GET /api/v1/admin/listings/{id}
async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ListingWithOwner>, ApiError> {
    Ok(Json(state.listing_service.admin_get(id).await?))
}

/// POST /api/v1/admin/listings/{id}/review
async fn review_listing(
    State(state): State<AppState>,
    admin: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let listing = state
        .listing_service
        .review(&admin.0, id, body.status, body.rejection_reason)
        .await?;
    Ok(Json(ReviewResponse {
        message: format!("Listing {} successfully", listing.status),
        listing,
    }))
}

/// POST /api/v1/admin/listings/{id}/feature?featured=
async fn feature_listing(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<FeatureQuery>,
) -> Result<Json<FeatureResponse>, ApiError> {
    let listing = state
        .listing_service
        .set_featured(id, query.featured)
        .await?;
    let message = if listing.is_featured {
        "Listing featured successfully"
    } else {
        "Listing unfeatured successfully"
    };
    Ok(Json(FeatureResponse {
        message,
        is_featured: listing.is_featured,
    }))
}

// ============================================================================
// Plans and subscriptions
// ============================================================================

/// GET /api/v1/admin/plans - every plan, active or not
async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<Plan>>, ApiError> {
    Ok(Json(state.plan_service.list(false).await?))
}

/// PUT /api/v1/admin/plans/{id}?price=
async fn update_plan_price(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<PlanPriceQuery>,
) -> Result<Json<PlanPriceResponse>, ApiError> {
    state.plan_service.update_price(id, query.price).await?;
    Ok(Json(PlanPriceResponse {
        message: "Plan price updated successfully",
        new_price: query.price,
    }))
}

/// GET /api/v1/admin/subscriptions
async fn list_subscriptions(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<SubscriptionWithNames>>, ApiError> {
    let (offset, limit) = page.validate()?;
    Ok(Json(
        state
            .plan_service
            .list_all_subscriptions(offset, limit)
            .await?,
    ))
}
