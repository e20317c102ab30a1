//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the JSON error envelope, and the mapping from service errors
//! - Bearer token authentication (`require_auth`, `optional_auth`)
//! - Admin authorization (`require_admin`)
//! - Extractors for the authenticated user and the client address

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::config::{Config, UploadConfig};
use crate::db::repositories::{
    SqlxContactRepository, SqlxFavoriteRepository, SqlxListingImageRepository,
    SqlxListingRepository, SqlxLoginLogRepository, SqlxPlanRepository, SqlxQuoteRepository,
    SqlxSiteSettingRepository, SqlxSubscriptionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    lead_limiter, AdminService, AdminServiceError, ContactService, ContactServiceError,
    FavoriteService, FavoriteServiceError, ImageService, ImageServiceError, ListingService,
    ListingServiceError, LoginRateLimiter, MaintenanceService, PlanService, PlanServiceError,
    QuoteService, QuoteServiceError, SettingsService, SettingsServiceError, SlidingWindow,
    TokenService, UserService, UserServiceError,
};

pub const ADMIN_REQUIRED_MESSAGE: &str = "Access denied. Admin privileges required.";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub upload_config: Arc<UploadConfig>,
    pub user_service: Arc<UserService>,
    pub listing_service: Arc<ListingService>,
    pub image_service: Arc<ImageService>,
    pub favorite_service: Arc<FavoriteService>,
    pub plan_service: Arc<PlanService>,
    pub contact_service: Arc<ContactService>,
    pub quote_service: Arc<QuoteService>,
    pub settings_service: Arc<SettingsService>,
    pub admin_service: Arc<AdminService>,
    pub maintenance: Arc<MaintenanceService>,
    pub login_limiter: Arc<LoginRateLimiter>,
    /// Public form submissions (quotes, contact) per IP
    pub lead_limiter: Arc<SlidingWindow<IpAddr>>,
}

impl AppState {
    /// Wire repositories and services on top of a migrated pool
    pub fn new(pool: DynDatabasePool, config: Config) -> anyhow::Result<Self> {
        let tokens = TokenService::new(&config.security)?;
        let upload_config = Arc::new(config.upload.clone());
        let login_limiter = Arc::new(LoginRateLimiter::new());
        let lead_limiter = Arc::new(lead_limiter());

        let users = SqlxUserRepository::boxed(pool.clone());
        let listings = SqlxListingRepository::boxed(pool.clone());
        let subscriptions = SqlxSubscriptionRepository::boxed(pool.clone());

        Ok(Self {
            user_service: Arc::new(UserService::new(
                users.clone(),
                SqlxLoginLogRepository::boxed(pool.clone()),
                login_limiter.clone(),
                tokens,
            )),
            listing_service: Arc::new(ListingService::new(listings.clone())),
            image_service: Arc::new(ImageService::new(
                SqlxListingImageRepository::boxed(pool.clone()),
                upload_config.clone(),
            )),
            favorite_service: Arc::new(FavoriteService::new(
                SqlxFavoriteRepository::boxed(pool.clone()),
                listings.clone(),
            )),
            plan_service: Arc::new(PlanService::new(
                SqlxPlanRepository::boxed(pool.clone()),
                subscriptions.clone(),
            )),
            contact_service: Arc::new(ContactService::new(SqlxContactRepository::boxed(
                pool.clone(),
            ))),
            quote_service: Arc::new(QuoteService::new(SqlxQuoteRepository::boxed(pool.clone()))),
            settings_service: Arc::new(SettingsService::new(SqlxSiteSettingRepository::boxed(
                pool.clone(),
            ))),
            admin_service: Arc::new(AdminService::new(
                users,
                listings.clone(),
                subscriptions.clone(),
            )),
            maintenance: Arc::new(MaintenanceService::new(
                listings,
                subscriptions,
                login_limiter.clone(),
                lead_limiter.clone(),
            )),
            login_limiter,
            lead_limiter,
            upload_config,
            config: Arc::new(config),
            pool,
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The caller when a valid token was sent, `None` otherwise
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn as_ref(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// Client address used for throttling; proxy headers count only when
/// `server.trust_proxy` is set
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new("PAYLOAD_TOO_LARGE", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after: i64) -> Self {
        Self::with_details(
            "RATE_LIMIT",
            message,
            serde_json::json!({ "retry_after": retry_after }),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Log the cause and hide it from the client
    fn internal(error: &anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", error);
        Self::internal_error("Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "USER_BANNED" => StatusCode::FORBIDDEN,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::AccountBlocked(msg) => {
                ApiError::with_details("USER_BANNED", msg, serde_json::json!({}))
            }
            UserServiceError::RateLimited { retry_after } => ApiError::rate_limited(
                "Too many login attempts. Please try again later.",
                retry_after,
            ),
            UserServiceError::ValidationError(msg) | UserServiceError::UserExists(msg) => {
                ApiError::validation_error(msg)
            }
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<ListingServiceError> for ApiError {
    fn from(e: ListingServiceError) -> Self {
        match e {
            ListingServiceError::NotFound => ApiError::not_found("Listing not found"),
            ListingServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ListingServiceError::AuthenticationRequired(msg) => ApiError::unauthorized(msg),
            ListingServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ListingServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<ImageServiceError> for ApiError {
    fn from(e: ImageServiceError) -> Self {
        match e {
            ImageServiceError::NotFound => ApiError::not_found("Image not found"),
            ImageServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ImageServiceError::TooLarge(msg) => ApiError::payload_too_large(msg),
            ImageServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<FavoriteServiceError> for ApiError {
    fn from(e: FavoriteServiceError) -> Self {
        match e {
            FavoriteServiceError::ListingNotFound => ApiError::not_found("Listing not found"),
            FavoriteServiceError::AlreadyFavorite => {
                ApiError::validation_error("Already in favorites")
            }
            FavoriteServiceError::NotFavorite => ApiError::not_found("Not in favorites"),
            FavoriteServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<PlanServiceError> for ApiError {
    fn from(e: PlanServiceError) -> Self {
        match e {
            PlanServiceError::PlanNotFound => ApiError::not_found("Plan not found"),
            PlanServiceError::SubscriptionNotFound => {
                ApiError::not_found("Subscription not found")
            }
            PlanServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            PlanServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<ContactServiceError> for ApiError {
    fn from(e: ContactServiceError) -> Self {
        match e {
            ContactServiceError::NotFound => ApiError::not_found("Message not found"),
            ContactServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ContactServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<QuoteServiceError> for ApiError {
    fn from(e: QuoteServiceError) -> Self {
        match e {
            QuoteServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            QuoteServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            QuoteServiceError::Conflict(msg) => ApiError::conflict(msg),
            QuoteServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<SettingsServiceError> for ApiError {
    fn from(e: SettingsServiceError) -> Self {
        match e {
            SettingsServiceError::NotFound => ApiError::not_found("Setting not found"),
            SettingsServiceError::NotPublic => ApiError::forbidden("This setting is not public"),
            SettingsServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            SettingsServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<AdminServiceError> for ApiError {
    fn from(e: AdminServiceError) -> Self {
        match e {
            AdminServiceError::UserNotFound => ApiError::not_found("User not found"),
            AdminServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            AdminServiceError::Conflict(msg) => ApiError::conflict(msg),
            AdminServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// First address of X-Forwarded-For, then X-Real-IP
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = forwarded.split(',').next().and_then(|ip| ip.trim().parse().ok()) {
            return Some(ip);
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|ip| ip.trim().parse().ok())
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?
        .to_string();

    let user = state.user_service.authenticate(&token).await?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware: a bad or missing token is ignored
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_bearer_token(request.headers()).map(str::to_string) {
        if let Ok(user) = state.user_service.authenticate(&token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

/// Admin authorization middleware (runs after `require_auth`)
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    if !user.0.is_admin() {
        tracing::warn!(user_id = user.0.id, "Admin route denied");
        return Err(ApiError::forbidden(ADMIN_REQUIRED_MESSAGE));
    }

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|user| user.0.clone()),
        ))
    }
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(parts, state.config.server.trust_proxy)))
    }
}

/// The socket peer, or the forwarded address when the proxy is trusted
fn client_ip(parts: &Parts, trust_proxy: bool) -> Option<IpAddr> {
    let forwarded = if trust_proxy {
        forwarded_ip(&parts.headers)
    } else {
        None
    };
    forwarded.or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

/// Count a public form submission; 429 when the address is over the limit.
/// Requests without a known address are not throttled.
pub async fn check_lead_limit(state: &AppState, ip: ClientIp) -> Result<(), ApiError> {
    if let Some(ip) = ip.0 {
        if let Err(retry_after) = state.lead_limiter.hit(ip).await {
            tracing::warn!(%ip, retry_after, "Lead form rate limit hit");
            return Err(ApiError::rate_limited(
                "Too many requests. Please try again later.",
                retry_after,
            ));
        }
    }
    Ok(())
}
