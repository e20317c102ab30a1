//! Login audit repository

use crate::db::DynDatabasePool;
use crate::models::NewLoginLog;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait LoginLogRepository: Send + Sync {
    async fn record(&self, entry: &NewLoginLog) -> Result<()>;

    /// Number of failed attempts recorded for `identifier`
    async fn count_failures(&self, identifier: &str) -> Result<i64>;
}

pub struct SqlxLoginLogRepository {
    pool: DynDatabasePool,
}

impl SqlxLoginLogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LoginLogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LoginLogRepository for SqlxLoginLogRepository {
    async fn record(&self, entry: &NewLoginLog) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                INSERT INTO login_logs (identifier, ip_address, user_agent, success, failure_reason, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.identifier)
            .bind(&entry.ip_address)
            .bind(&entry.user_agent)
            .bind(entry.success)
            .bind(&entry.failure_reason)
            .bind(Utc::now())
            .execute(p)
            .await
            .map(|_| ())
        })
        .context("Failed to record login attempt")?;
        Ok(())
    }

    async fn count_failures(&self, identifier: &str) -> Result<i64> {
        let count = with_pool!(self.pool, |p| {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM login_logs WHERE identifier = ? AND success = FALSE",
            )
            .bind(identifier)
            .fetch_one(p)
            .await
        })
        .context("Failed to count login failures")?;
        Ok(count)
    }
}
