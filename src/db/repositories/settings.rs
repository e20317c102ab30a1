//! Site settings repository
//!
//! Key-value rows edited from the admin panel. Public rows are served to
//! anonymous clients (branding, contact details, legal texts).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::SiteSetting;

/// Repository trait for settings operations
#[async_trait]
pub trait SiteSettingRepository: Send + Sync {
    /// Get a single setting by key
    async fn get(&self, key: &str) -> Result<Option<SiteSetting>>;

    /// All settings ordered by key; `public_only` hides private rows
    async fn list(&self, public_only: bool) -> Result<Vec<SiteSetting>>;

    /// Insert or update a setting. `description` and `is_public` are kept
    /// unchanged on update when `None`; a new row defaults to private.
    async fn upsert(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
        is_public: Option<bool>,
    ) -> Result<SiteSetting>;

    /// Insert unless the key exists; returns whether a row was created
    async fn insert_if_absent(
        &self,
        key: &str,
        value: &str,
        description: &str,
        is_public: bool,
    ) -> Result<bool>;
}

/// SQLx-based settings repository
pub struct SqlxSiteSettingRepository {
    pool: DynDatabasePool,
}

impl SqlxSiteSettingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SiteSettingRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SiteSettingRepository for SqlxSiteSettingRepository {
    async fn get(&self, key: &str) -> Result<Option<SiteSetting>> {
        let setting = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, SiteSetting>("SELECT * FROM site_settings WHERE setting_key = ?")
                .bind(key)
                .fetch_optional(p)
                .await
        })
        .context("Failed to get setting")?;
        Ok(setting)
    }

    async fn list(&self, public_only: bool) -> Result<Vec<SiteSetting>> {
        let settings = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, SiteSetting>(
                "SELECT * FROM site_settings WHERE (? = FALSE OR is_public = TRUE) ORDER BY setting_key",
            )
            .bind(public_only)
            .fetch_all(p)
            .await
        })
        .context("Failed to list settings")?;
        Ok(settings)
    }

    async fn upsert(
        &self,
        key: &str,
        value: &str,
        description: Option<&str>,
        is_public: Option<bool>,
    ) -> Result<SiteSetting> {
        let now = Utc::now();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(
                    r#"
                    INSERT INTO site_settings (setting_key, value, description, is_public, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON CONFLICT(setting_key) DO UPDATE SET
                        value = excluded.value,
                        description = COALESCE(?, description),
                        is_public = COALESCE(?, is_public),
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(key)
                .bind(value)
                .bind(description)
                .bind(is_public.unwrap_or(false))
                .bind(now)
                .bind(now)
                .bind(description)
                .bind(is_public)
                .execute(self.pool.sqlite()?)
                .await
                .map(|_| ())
            }
            DatabaseDriver::Mysql => {
                sqlx::query(
                    r#"
                    INSERT INTO site_settings (setting_key, value, description, is_public, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    ON DUPLICATE KEY UPDATE
                        value = VALUES(value),
                        description = COALESCE(?, description),
                        is_public = COALESCE(?, is_public),
                        updated_at = VALUES(updated_at)
                    "#,
                )
                .bind(key)
                .bind(value)
                .bind(description)
                .bind(is_public.unwrap_or(false))
                .bind(now)
                .bind(now)
                .bind(description)
                .bind(is_public)
                .execute(self.pool.mysql()?)
                .await
                .map(|_| ())
            }
        }
        .context("Failed to save setting")?;

        self.get(key)
            .await?
            .context("Setting disappeared after upsert")
    }

    async fn insert_if_absent(
        &self,
        key: &str,
        value: &str,
        description: &str,
        is_public: bool,
    ) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                r#"
                INSERT INTO site_settings (setting_key, value, description, is_public, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(setting_key) DO NOTHING
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(description)
            .bind(is_public)
            .bind(now)
            .bind(now)
            .execute(self.pool.sqlite()?)
            .await
            .map(|r| r.rows_affected()),
            DatabaseDriver::Mysql => sqlx::query(
                r#"
                INSERT IGNORE INTO site_settings (setting_key, value, description, is_public, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(description)
            .bind(is_public)
            .bind(now)
            .bind(now)
            .execute(self.pool.mysql()?)
            .await
            .map(|r| r.rows_affected()),
        }
        .context("Failed to insert default setting")?;
        Ok(affected > 0)
    }
}
