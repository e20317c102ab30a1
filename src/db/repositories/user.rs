//! User repository
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{NewUser, User, UserRole, UserStatus, UserWithAdsCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &NewUser) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email (case-insensitive)
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by phone
    async fn get_by_phone(&self, phone: &str) -> Result<Option<User>>;

    /// Persist every mutable column of `user`
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user; owned rows cascade
    async fn delete(&self, id: i64) -> Result<()>;

    /// Admin listing with optional role/status filters, newest first
    async fn list(
        &self,
        role: Option<UserRole>,
        status: Option<UserStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<UserWithAdsCount>>;

    /// Count users, optionally restricted to one role
    async fn count_by_role(&self, role: Option<UserRole>) -> Result<i64>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT * FROM users WHERE {} LIMIT 1", clause);
        let user = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, User>(&sql)
                .bind(value)
                .fetch_optional(p)
                .await
        })
        .with_context(|| format!("Failed to get user by {}", clause))?;
        Ok(user)
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User> {
        let now = Utc::now();
        let sql = r#"
            INSERT INTO users (email, username, password_hash, full_name, phone, role, status,
                               is_active, is_verified, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 'active', TRUE, FALSE, ?, ?)
        "#;

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&user.email)
                .bind(&user.username)
                .bind(&user.password_hash)
                .bind(&user.full_name)
                .bind(&user.phone)
                .bind(user.role.as_str())
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&user.email)
                .bind(&user.username)
                .bind(&user.password_hash)
                .bind(&user.full_name)
                .bind(&user.phone)
                .bind(user.role.as_str())
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create user")?;

        self.get_by_id(id)
            .await?
            .context("User disappeared after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(p)
                .await
        })
        .context("Failed to get user by ID")?;
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_one_where("LOWER(email) = LOWER(?)", email).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.fetch_one_where("username = ?", username).await
    }

    async fn get_by_phone(&self, phone: &str) -> Result<Option<User>> {
        self.fetch_one_where("phone = ?", phone).await
    }

    async fn update(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE users SET
                    email = ?, username = ?, password_hash = ?, full_name = ?, phone = ?,
                    role = ?, status = ?, company_name = ?, company_address = ?,
                    company_description = ?, city = ?, avatar_url = ?, is_active = ?,
                    is_verified = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(&user.phone)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(&user.company_name)
            .bind(&user.company_address)
            .bind(&user.company_description)
            .bind(&user.city)
            .bind(&user.avatar_url)
            .bind(user.is_active)
            .bind(user.is_verified)
            .bind(now)
            .bind(user.id)
            .execute(p)
            .await
            .map(|_| ())
        })
        .context("Failed to update user")?;

        Ok(User {
            updated_at: now,
            ..user.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to delete user")?;
        Ok(())
    }

    async fn list(
        &self,
        role: Option<UserRole>,
        status: Option<UserStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<UserWithAdsCount>> {
        let role = role.map(|r| r.as_str());
        let status = status.map(|s| s.as_str());
        let users = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, UserWithAdsCount>(
                r#"
                SELECT u.*,
                       (SELECT COUNT(*) FROM listings l WHERE l.owner_id = u.id) AS ads_count
                FROM users u
                WHERE (? IS NULL OR u.role = ?)
                  AND (? IS NULL OR u.status = ?)
                ORDER BY u.created_at DESC, u.id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(role)
            .bind(role)
            .bind(status)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(p)
            .await
        })
        .context("Failed to list users")?;
        Ok(users)
    }

    async fn count_by_role(&self, role: Option<UserRole>) -> Result<i64> {
        let role = role.map(|r| r.as_str());
        let count = with_pool!(self.pool, |p| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE (? IS NULL OR role = ?)")
                .bind(role)
                .bind(role)
                .fetch_one(p)
                .await
        })
        .context("Failed to count users")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::{insert_listing, insert_user, migrated_pool};
    use crate::models::ListingStatus;
    use crate::services::password::hash_password;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = migrated_pool().await;
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: hash_password("test_password").expect("Failed to hash password"),
            full_name: Some("Test User".to_string()),
            phone: Some("0512345678".to_string()),
            role: UserRole::Advertiser,
        }
    }

    #[tokio::test]
    async fn test_create_user() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo
            .create(&new_user("testuser", "test@example.com"))
            .await
            .expect("Failed to create user");

        assert!(created.id > 0);
        assert_eq!(created.username, "testuser");
        assert_eq!(created.role, UserRole::Advertiser);
        assert_eq!(created.status, UserStatus::Active);
        assert!(created.is_active);
        assert!(!created.is_verified);
    }

    #[tokio::test]
    async fn test_lookup_by_email_phone_username() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo
            .create(&new_user("findme", "FindMe@example.com"))
            .await
            .unwrap();

        let by_email = repo.get_by_email("findme@EXAMPLE.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));

        let by_phone = repo.get_by_phone("0512345678").await.unwrap();
        assert_eq!(by_phone.map(|u| u.id), Some(created.id));

        let by_username = repo.get_by_username("findme").await.unwrap();
        assert_eq!(by_username.map(|u| u.id), Some(created.id));

        assert!(repo.get_by_id(999).await.unwrap().is_none());
        assert!(repo.get_by_phone("0599999999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user() {
        let (_pool, repo) = setup_test_repo().await;
        let mut user = repo.create(&new_user("upd", "upd@example.com")).await.unwrap();

        user.company_name = Some("Kitchens Co".to_string());
        user.set_status(UserStatus::Suspended);
        repo.update(&user).await.expect("Failed to update user");

        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.company_name.as_deref(), Some("Kitchens Co"));
        assert_eq!(found.status, UserStatus::Suspended);
        assert!(!found.is_active);
    }

    #[tokio::test]
    async fn test_unique_email_constraint() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&new_user("one", "same@example.com")).await.unwrap();

        let result = repo.create(&new_user("two", "same@example.com")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (_pool, repo) = setup_test_repo().await;
        let user = repo.create(&new_user("gone", "gone@example.com")).await.unwrap();

        repo.delete(user.id).await.expect("Failed to delete user");
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_with_filters_and_ads_count() {
        let (pool, repo) = setup_test_repo().await;
        let advertiser = insert_user(&pool, "adv", UserRole::Advertiser).await;
        insert_user(&pool, "client", UserRole::Client).await;
        insert_listing(&pool, advertiser.id, "Kitchen one", ListingStatus::Pending).await;
        insert_listing(&pool, advertiser.id, "Kitchen two", ListingStatus::Approved).await;

        let all = repo.list(None, None, 0, 100).await.unwrap();
        assert_eq!(all.len(), 2);

        let advertisers = repo
            .list(Some(UserRole::Advertiser), None, 0, 100)
            .await
            .unwrap();
        assert_eq!(advertisers.len(), 1);
        assert_eq!(advertisers[0].ads_count, 2);

        let banned = repo.list(None, Some(UserStatus::Banned), 0, 100).await.unwrap();
        assert!(banned.is_empty());

        let paged = repo.list(None, None, 1, 1).await.unwrap();
        assert_eq!(paged.len(), 1);
    }

    #[tokio::test]
    async fn test_count_by_role() {
        let (pool, repo) = setup_test_repo().await;
        insert_user(&pool, "a", UserRole::Client).await;
        insert_user(&pool, "b", UserRole::Client).await;
        insert_user(&pool, "c", UserRole::Admin).await;

        assert_eq!(repo.count_by_role(None).await.unwrap(), 3);
        assert_eq!(repo.count_by_role(Some(UserRole::Client)).await.unwrap(), 2);
        assert_eq!(repo.count_by_role(Some(UserRole::Advertiser)).await.unwrap(), 0);
    }
}
