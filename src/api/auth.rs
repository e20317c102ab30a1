//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/v1/auth/register - User registration
//! - POST /api/v1/auth/login - Email login (form encoded)
//! - POST /api/v1/auth/login/phone - Phone login
//! - GET/PUT /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/password - Change password

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Form, Json, Router,
};
use serde::Deserialize;

use crate::api::common::MessageResponse;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, ClientIp};
use crate::models::User;
use crate::services::user::{ClientInfo, Credential, ProfileUpdate, RegisterInput};

/// OAuth2-style password form; `username` carries the email
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PhoneLoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct MeUpdateRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/login/phone", post(login_phone))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_current_user).put(update_current_user))
        .route("/password", put(change_password))
}

fn client_info(ip: ClientIp, headers: &HeaderMap) -> ClientInfo {
    ClientInfo {
        ip: ip.0,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(String::from),
    }
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.user_service.register(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state
        .user_service
        .login(
            Credential::Email(form.username),
            &form.password,
            &client_info(ip, &headers),
        )
        .await?;
    Ok(Json(token))
}

/// POST /api/v1/auth/login/phone
async fn login_phone(
    State(state): State<AppState>,
    ip: ClientIp,
    headers: HeaderMap,
    Json(body): Json<PhoneLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state
        .user_service
        .login(
            Credential::Phone(body.phone),
            &body.password,
            &client_info(ip, &headers),
        )
        .await?;
    Ok(Json(token))
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<User> {
    Json(user.0)
}

/// PUT /api/v1/auth/me
async fn update_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<MeUpdateRequest>,
) -> Result<Json<User>, ApiError> {
    let update = ProfileUpdate {
        full_name: body.full_name,
        phone: body.phone,
        ..Default::default()
    };
    let user = state.user_service.update_profile(user.0, update).await?;
    Ok(Json(user))
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<PasswordChangeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .user_service
        .change_password(user.0, &body.current_password, &body.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password updated successfully")))
}
