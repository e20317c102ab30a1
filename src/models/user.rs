//! User model
//!
//! Accounts are either clients (browse, favorite, request quotes),
//! advertisers (publish listings, subscribe to plans) or admins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// User role for authorization.
    pub enum UserRole ("user role") {
        /// Browses listings and keeps favorites
        Client => "client",
        /// Publishes listings and holds subscriptions
        Advertiser => "advertiser",
        /// Full access, including moderation
        Admin => "admin",
    }
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Client
    }
}

string_enum! {
    /// Account state. Only `Active` accounts may log in.
    pub enum UserStatus ("user status") {
        Active => "active",
        /// Temporarily blocked by an admin
        Suspended => "suspended",
        /// Permanently blocked by an admin
        Banned => "banned",
    }
}

impl Default for UserStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Email address (unique, login identifier)
    pub email: String,
    /// Username (unique)
    pub username: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    /// Saudi mobile number, also usable for login
    pub phone: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    #[sqlx(try_from = "String")]
    pub status: UserStatus,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub company_description: Option<String>,
    pub city: Option<String>,
    pub avatar_url: Option<String>,
    /// Mirrors `status == Active`
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Check if the user may log in and use authenticated endpoints
    pub fn can_login(&self) -> bool {
        self.is_active && self.status == UserStatus::Active
    }

    /// Owners and admins may manage a listing
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.is_admin() || self.id == owner_id
    }

    /// Apply a status change, keeping `is_active` in sync
    pub fn set_status(&mut self, status: UserStatus) {
        self.status = status;
        self.is_active = status == UserStatus::Active;
    }

    /// Display name: full name when present, username otherwise
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

/// Input for inserting a user (password already hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
}

/// A user row plus the number of listings they own (admin user list)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserWithAdsCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: User,
    pub ads_count: i64,
}

#[cfg(test)]
pub(crate) fn sample_user(id: i64, role: UserRole) -> User {
    let now = Utc::now();
    User {
        id,
        email: format!("user{}@kitchentech.sa", id),
        username: format!("user{}", id),
        password_hash: "hash".to_string(),
        full_name: None,
        phone: None,
        role,
        status: UserStatus::Active,
        company_name: None,
        company_address: None,
        company_description: None,
        city: None,
        avatar_url: None,
        is_active: true,
        is_verified: false,
        created_at: now,
        updated_at: now,
    }
}
