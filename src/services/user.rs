//! User service
//!
//! Account lifecycle and authentication:
//! - Registration with email/username/phone uniqueness
//! - Login by email or phone, throttled per identifier and per IP
//! - Bearer token resolution for the auth middleware
//! - Self-service profile edits, password change and account deletion
//!
//! Every login attempt is written to the login audit log on a best-effort
//! basis; a failing audit insert never blocks a login.

use crate::db::repositories::{LoginLogRepository, UserRepository};
use crate::models::{NewLoginLog, NewUser, User, UserRole, UserStatus};
use crate::services::password::{hash_password, is_strong_enough, verify_password, MIN_PASSWORD_LENGTH};
use crate::services::rate_limiter::LoginRateLimiter;
use crate::services::token::{TokenError, TokenService};
use crate::services::validation::{
    is_valid_email, non_blank, normalize_phone, INVALID_PHONE_MESSAGE,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials or token
    #[error("{0}")]
    AuthenticationError(String),

    /// Account exists but may not log in
    #[error("{0}")]
    AccountBlocked(String),

    /// Too many attempts
    #[error("Too many login attempts. Please try again later.")]
    RateLimited { retry_after: i64 },

    #[error("{0}")]
    ValidationError(String),

    /// Email, username or phone already taken
    #[error("{0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Where a request came from, for throttling and the audit log
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

/// Login identifier
#[derive(Debug, Clone)]
pub enum Credential {
    Email(String),
    Phone(String),
}

impl Credential {
    /// Lookup key: lowercased email, or the phone in its stored `05XXXXXXXX`
    /// form when it normalizes
    fn value(&self) -> String {
        match self {
            Credential::Email(v) => v.trim().to_lowercase(),
            Credential::Phone(v) => normalize_phone(v).unwrap_or_else(|| v.trim().to_string()),
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Credential::Email(_) => "Incorrect email or password",
            Credential::Phone(_) => "Incorrect phone or password",
        }
    }
}

/// Issued access token, serialized as the login response
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Input for user registration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
}

impl RegisterInput {
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }
}

/// Self-service profile changes; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub company_description: Option<String>,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
}

/// User service for managing accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    login_logs: Arc<dyn LoginLogRepository>,
    limiter: Arc<LoginRateLimiter>,
    tokens: TokenService,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        login_logs: Arc<dyn LoginLogRepository>,
        limiter: Arc<LoginRateLimiter>,
        tokens: TokenService,
    ) -> Self {
        Self {
            user_repo,
            login_logs,
            limiter,
            tokens,
        }
    }

    /// Register a new client or advertiser account
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a malformed email, username, password or role
    /// - `UserExists` if the email, username or phone is taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let email = input.email.trim().to_lowercase();
        let username = input.username.trim().to_string();

        validate_registration(&email, &username, &input.password, input.role)?;
        let phone = account_phone(input.phone)?;

        let phone_taken = match phone.as_deref() {
            Some(phone) => self.user_repo.get_by_phone(phone).await?.is_some(),
            None => false,
        };
        if phone_taken
            || self.user_repo.get_by_email(&email).await?.is_some()
            || self.user_repo.get_by_username(&username).await?.is_some()
        {
            return Err(UserServiceError::UserExists(
                "Email or username already registered".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let user = self
            .user_repo
            .create(&NewUser {
                email,
                username,
                password_hash,
                full_name: non_blank(input.full_name),
                phone,
                role: input.role.unwrap_or_default(),
            })
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Create the first admin account; `None` when an admin already exists
    pub async fn ensure_admin(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if self.user_repo.count_by_role(Some(UserRole::Admin)).await? > 0 {
            return Ok(None);
        }

        let email = email.trim().to_lowercase();
        let username = email.split('@').next().unwrap_or_default().to_string();
        validate_registration(&email, &username, password, None)?;
        if self.user_repo.get_by_email(&email).await?.is_some()
            || self.user_repo.get_by_username(&username).await?.is_some()
        {
            return Err(UserServiceError::UserExists(
                "Email or username already registered".to_string(),
            ));
        }

        let password_hash = hash_password(password).context("Failed to hash password")?;
        let admin = self
            .user_repo
            .create(&NewUser {
                email,
                username,
                password_hash,
                full_name: Some("Administrator".to_string()),
                phone: None,
                role: UserRole::Admin,
            })
            .await
            .context("Failed to create admin")?;

        tracing::info!(user_id = admin.id, "Admin account created");
        Ok(Some(admin))
    }

    /// Verify credentials and issue an access token
    ///
    /// # Errors
    ///
    /// - `RateLimited` when the IP or identifier is throttled
    /// - `AuthenticationError` for an unknown account or wrong password
    /// - `AccountBlocked` for inactive, suspended or banned accounts
    pub async fn login(
        &self,
        credential: Credential,
        password: &str,
        client: &ClientInfo,
    ) -> Result<AccessToken, UserServiceError> {
        let identifier = credential.value();

        if let Some(ip) = client.ip {
            if let Err(retry_after) = self.limiter.hit_ip(ip).await {
                tracing::warn!(%ip, "Login rate limit exceeded for IP");
                return Err(UserServiceError::RateLimited { retry_after });
            }
        }
        if let Some(retry_after) = self.limiter.identifier_retry_after(&identifier).await {
            tracing::warn!(identifier = %identifier, "Login rate limit exceeded for identifier");
            self.audit(NewLoginLog::failure(&identifier, ip_string(client), client.user_agent.clone(), "rate_limited"))
                .await;
            return Err(UserServiceError::RateLimited { retry_after });
        }

        let user = match &credential {
            Credential::Email(_) => self.user_repo.get_by_email(&identifier).await?,
            Credential::Phone(_) => self.user_repo.get_by_phone(&identifier).await?,
        };

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash)? => user,
            found => {
                let reason = if found.is_some() { "invalid_password" } else { "user_not_found" };
                self.limiter.record_failed_attempt(&identifier).await;
                self.audit(NewLoginLog::failure(&identifier, ip_string(client), client.user_agent.clone(), reason))
                    .await;
                return Err(UserServiceError::AuthenticationError(
                    credential.failure_message().to_string(),
                ));
            }
        };

        if !user.can_login() {
            let reason = format!("account_{}", user.status);
            self.audit(NewLoginLog::failure(&identifier, ip_string(client), client.user_agent.clone(), &reason))
                .await;
            return Err(UserServiceError::AccountBlocked(blocked_message(&user)));
        }

        self.limiter.clear_identifier(&identifier).await;
        self.audit(NewLoginLog::success(&identifier, ip_string(client), client.user_agent.clone()))
            .await;

        let access_token = self
            .tokens
            .issue(&user)
            .map_err(|e| UserServiceError::InternalError(anyhow::anyhow!(e)))?;

        Ok(AccessToken {
            access_token,
            token_type: "bearer",
        })
    }

    /// Resolve a bearer token to an active user
    pub async fn authenticate(&self, token: &str) -> Result<User, UserServiceError> {
        let claims = self.tokens.verify(token).map_err(|e| match e {
            TokenError::Expired => {
                UserServiceError::AuthenticationError("Token has expired".to_string())
            }
            _ => UserServiceError::AuthenticationError(
                "Could not validate credentials".to_string(),
            ),
        })?;

        let user = self
            .user_repo
            .get_by_email(&claims.sub)
            .await?
            .ok_or_else(|| {
                UserServiceError::AuthenticationError("Could not validate credentials".to_string())
            })?;

        if !user.can_login() {
            return Err(UserServiceError::AuthenticationError(
                "Inactive user account".to_string(),
            ));
        }
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// Apply profile changes; a new phone must not belong to someone else
    pub async fn update_profile(
        &self,
        mut user: User,
        update: ProfileUpdate,
    ) -> Result<User, UserServiceError> {
        if let Some(phone) = update.phone {
            let phone = account_phone(Some(phone))?;
            if let Some(p) = phone.as_deref() {
                if let Some(other) = self.user_repo.get_by_phone(p).await? {
                    if other.id != user.id {
                        return Err(UserServiceError::UserExists(
                            "Phone number already registered".to_string(),
                        ));
                    }
                }
            }
            user.phone = phone;
        }

        let ProfileUpdate {
            full_name,
            company_name,
            company_address,
            company_description,
            city,
            avatar_url,
            ..
        } = update;
        for (field, value) in [
            (&mut user.full_name, full_name),
            (&mut user.company_name, company_name),
            (&mut user.company_address, company_address),
            (&mut user.company_description, company_description),
            (&mut user.city, city),
            (&mut user.avatar_url, avatar_url),
        ] {
            if value.is_some() {
                *field = non_blank(value);
            }
        }

        let updated = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update profile")?;
        Ok(updated)
    }

    /// Change the password after checking the current one
    pub async fn change_password(
        &self,
        mut user: User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        if !verify_password(current_password, &user.password_hash)? {
            return Err(UserServiceError::ValidationError(
                "Current password is incorrect".to_string(),
            ));
        }
        if !is_strong_enough(new_password) {
            return Err(password_too_short());
        }

        user.password_hash = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo
            .update(&user)
            .await
            .context("Failed to update password")?;

        tracing::info!(user_id = user.id, "Password changed");
        Ok(())
    }

    /// Delete the account; owned rows cascade in the database
    pub async fn delete_account(&self, user_id: i64) -> Result<(), UserServiceError> {
        if self.user_repo.get_by_id(user_id).await?.is_none() {
            return Err(UserServiceError::NotFound);
        }
        self.user_repo
            .delete(user_id)
            .await
            .context("Failed to delete user")?;
        tracing::info!(user_id, "Account deleted");
        Ok(())
    }

    async fn audit(&self, entry: NewLoginLog) {
        if let Err(e) = self.login_logs.record(&entry).await {
            tracing::warn!("Failed to record login attempt: {:#}", e);
        }
    }
}

fn ip_string(client: &ClientInfo) -> Option<String> {
    client.ip.map(|ip| ip.to_string())
}

fn blocked_message(user: &User) -> String {
    match user.status {
        UserStatus::Suspended => {
            "Your account has been suspended. Please contact support.".to_string()
        }
        UserStatus::Banned => "Your account has been banned. Please contact support.".to_string(),
        UserStatus::Active => "Inactive user account".to_string(),
    }
}

fn password_too_short() -> UserServiceError {
    UserServiceError::ValidationError(format!(
        "Password must be at least {} characters",
        MIN_PASSWORD_LENGTH
    ))
}

/// Blank clears the phone; anything else must normalize to `05XXXXXXXX`
fn account_phone(raw: Option<String>) -> Result<Option<String>, UserServiceError> {
    match non_blank(raw) {
        None => Ok(None),
        Some(raw) => normalize_phone(&raw)
            .map(Some)
            .ok_or_else(|| UserServiceError::ValidationError(INVALID_PHONE_MESSAGE.to_string())),
    }
}

fn validate_registration(
    email: &str,
    username: &str,
    password: &str,
    role: Option<UserRole>,
) -> Result<(), UserServiceError> {
    if !is_valid_email(email) {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(UserServiceError::ValidationError(
            "Username must be between 3 and 50 characters".to_string(),
        ));
    }
    if !is_strong_enough(password) {
        return Err(password_too_short());
    }
    if role == Some(UserRole::Admin) {
        return Err(UserServiceError::ValidationError(
            "Role must be client or advertiser".to_string(),
        ));
    }
    Ok(())
}
