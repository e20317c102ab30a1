//! Quote request repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{NewQuoteRequest, QuoteRequest, QuoteStatus};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Columns `count_grouped` may aggregate on
const GROUPABLE_COLUMNS: &[&str] = &["style", "city", "status"];

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn create(&self, quote: &NewQuoteRequest) -> Result<QuoteRequest>;

    async fn get_by_id(&self, id: i64) -> Result<Option<QuoteRequest>>;

    /// Newest first, with optional exact status/city filters
    async fn list(
        &self,
        status: Option<QuoteStatus>,
        city: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<QuoteRequest>>;

    /// Whether `phone` submitted a request at or after `since`
    async fn exists_recent_phone(&self, phone: &str, since: DateTime<Utc>) -> Result<bool>;

    /// Set the status; notes are replaced only when given
    async fn update_status(
        &self,
        id: i64,
        status: QuoteStatus,
        admin_notes: Option<&str>,
    ) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    /// `(value, count)` pairs grouped by one of `style`, `city`, `status`
    async fn count_grouped(&self, column: &str) -> Result<Vec<(String, i64)>>;
}

pub struct SqlxQuoteRepository {
    pool: DynDatabasePool,
}

impl SqlxQuoteRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn QuoteRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl QuoteRepository for SqlxQuoteRepository {
    async fn create(&self, quote: &NewQuoteRequest) -> Result<QuoteRequest> {
        let now = Utc::now();
        let sql = r#"
            INSERT INTO quote_requests (style, city, phone, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#;

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(quote.style.as_str())
                .bind(&quote.city)
                .bind(&quote.phone)
                .bind(QuoteStatus::New.as_str())
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(quote.style.as_str())
                .bind(&quote.city)
                .bind(&quote.phone)
                .bind(QuoteStatus::New.as_str())
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create quote request")?;

        Ok(QuoteRequest {
            id,
            style: quote.style,
            city: quote.city.clone(),
            phone: quote.phone.clone(),
            status: QuoteStatus::New,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<QuoteRequest>> {
        let quote = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, QuoteRequest>("SELECT * FROM quote_requests WHERE id = ?")
                .bind(id)
                .fetch_optional(p)
                .await
        })
        .context("Failed to get quote request")?;
        Ok(quote)
    }

    async fn list(
        &self,
        status: Option<QuoteStatus>,
        city: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<QuoteRequest>> {
        let status = status.map(|s| s.as_str());
        let quotes = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, QuoteRequest>(
                r#"
                SELECT * FROM quote_requests
                WHERE (? IS NULL OR status = ?)
                  AND (? IS NULL OR city = ?)
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(status)
            .bind(status)
            .bind(city)
            .bind(city)
            .bind(limit)
            .bind(offset)
            .fetch_all(p)
            .await
        })
        .context("Failed to list quote requests")?;
        Ok(quotes)
    }

    async fn exists_recent_phone(&self, phone: &str, since: DateTime<Utc>) -> Result<bool> {
        let count = with_pool!(self.pool, |p| {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM quote_requests WHERE phone = ? AND created_at >= ?",
            )
            .bind(phone)
            .bind(since)
            .fetch_one(p)
            .await
        })
        .context("Failed to check recent quote requests")?;
        Ok(count > 0)
    }

    async fn update_status(
        &self,
        id: i64,
        status: QuoteStatus,
        admin_notes: Option<&str>,
    ) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE quote_requests
                SET status = ?, admin_notes = COALESCE(?, admin_notes), updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(status.as_str())
            .bind(admin_notes)
            .bind(Utc::now())
            .bind(id)
            .execute(p)
            .await
            .map(|_| ())
        })
        .context("Failed to update quote request")?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM quote_requests WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to delete quote request")?;
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count = with_pool!(self.pool, |p| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quote_requests")
                .fetch_one(p)
                .await
        })
        .context("Failed to count quote requests")?;
        Ok(count)
    }

    async fn count_grouped(&self, column: &str) -> Result<Vec<(String, i64)>> {
        if !GROUPABLE_COLUMNS.contains(&column) {
            bail!("Cannot group quote requests by {}", column);
        }
        let sql = format!(
            "SELECT {col}, COUNT(*) FROM quote_requests GROUP BY {col} ORDER BY {col}",
            col = column
        );
        let rows = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, (String, i64)>(&sql).fetch_all(p).await
        })
        .with_context(|| format!("Failed to group quote requests by {}", column))?;
        Ok(rows)
    }
}
