//! Plan and subscription API endpoints
//!
//! - GET /api/v1/plans, GET /api/v1/plans/{id}
//! - POST /api/v1/plans/subscribe
//! - GET /api/v1/plans/subscriptions/my, /subscriptions/active
//! - POST /api/v1/plans/subscriptions/{id}/confirm-payment
//! - POST /api/v1/plans/subscriptions/{id}/cancel

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Plan, Subscription, SubscriptionWithNames};
use crate::services::plan::DEFAULT_PAYMENT_METHOD;

const UNKNOWN_PLAN: &str = "Unknown";

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub plan_id: i64,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
}

fn default_payment_method() -> String {
    DEFAULT_PAYMENT_METHOD.to_string()
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentQuery {
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    pub message: &'static str,
    pub subscription_id: i64,
}

/// Build public plan routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans))
        .route("/{id}", get(get_plan))
}

/// Build protected plan routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/subscriptions/my", get(my_subscriptions))
        .route("/subscriptions/active", get(active_subscription))
        .route("/subscriptions/{id}/confirm-payment", post(confirm_payment))
        .route("/subscriptions/{id}/cancel", post(cancel_subscription))
}

fn with_plan_fallback(mut row: SubscriptionWithNames) -> SubscriptionWithNames {
    if row.plan_name.is_none() {
        row.plan_name = Some(UNKNOWN_PLAN.to_string());
    }
    row
}

/// GET /api/v1/plans - active plans ordered by price
async fn list_plans(State(state): State<AppState>) -> Result<Json<Vec<Plan>>, ApiError> {
    Ok(Json(state.plan_service.list(true).await?))
}

/// GET /api/v1/plans/{id}
async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Plan>, ApiError> {
    Ok(Json(state.plan_service.get(id).await?))
}

/// POST /api/v1/plans/subscribe
async fn subscribe(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let subscription = state
        .plan_service
        .subscribe(user.0.id, body.plan_id, Some(body.payment_method))
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// GET /api/v1/plans/subscriptions/my
async fn my_subscriptions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<SubscriptionWithNames>>, ApiError> {
    let rows = state.plan_service.my_subscriptions(user.0.id).await?;
    Ok(Json(rows.into_iter().map(with_plan_fallback).collect()))
}

/// GET /api/v1/plans/subscriptions/active - `null` when nothing is in force
async fn active_subscription(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Option<SubscriptionWithNames>>, ApiError> {
    let row = state.plan_service.active_subscription(user.0.id).await?;
    Ok(Json(row.map(with_plan_fallback)))
}

/// POST /api/v1/plans/subscriptions/{id}/confirm-payment?transaction_id=
async fn confirm_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<ConfirmPaymentQuery>,
) -> Result<Json<ConfirmPaymentResponse>, ApiError> {
    let subscription = state
        .plan_service
        .confirm_payment(user.0.id, id, &query.transaction_id)
        .await?;
    Ok(Json(ConfirmPaymentResponse {
        message: "Payment confirmed successfully",
        subscription_id: subscription.id,
    }))
}

/// POST /api/v1/plans/subscriptions/{id}/cancel
async fn cancel_subscription(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Subscription>, ApiError> {
    Ok(Json(state.plan_service.cancel(user.0.id, id).await?))
}
