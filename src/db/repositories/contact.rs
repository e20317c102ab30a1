//! Contact message repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ContactMessage, ContactStatus, NewContactMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, message: &NewContactMessage) -> Result<ContactMessage>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactMessage>>;

    /// Newest first, optionally restricted to one status
    async fn list(
        &self,
        status: Option<ContactStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ContactMessage>>;

    async fn update_status(
        &self,
        id: i64,
        status: ContactStatus,
        admin_notes: Option<&str>,
    ) -> Result<()>;
}

pub struct SqlxContactRepository {
    pool: DynDatabasePool,
}

impl SqlxContactRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContactRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ContactRepository for SqlxContactRepository {
    async fn create(&self, message: &NewContactMessage) -> Result<ContactMessage> {
        let now = Utc::now();
        let sql = r#"
            INSERT INTO contact_messages (name, email, message_type, message, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#;

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&message.name)
                .bind(&message.email)
                .bind(message.message_type.as_str())
                .bind(&message.message)
                .bind(ContactStatus::New.as_str())
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&message.name)
                .bind(&message.email)
                .bind(message.message_type.as_str())
                .bind(&message.message)
                .bind(ContactStatus::New.as_str())
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create contact message")?;

        Ok(ContactMessage {
            id,
            name: message.name.clone(),
            email: message.email.clone(),
            message_type: message.message_type,
            message: message.message.clone(),
            status: ContactStatus::New,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactMessage>> {
        let message = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, ContactMessage>("SELECT * FROM contact_messages WHERE id = ?")
                .bind(id)
                .fetch_optional(p)
                .await
        })
        .context("Failed to get contact message")?;
        Ok(message)
    }

    async fn list(
        &self,
        status: Option<ContactStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ContactMessage>> {
        let status = status.map(|s| s.as_str());
        let messages = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, ContactMessage>(
                r#"
                SELECT * FROM contact_messages
                WHERE (? IS NULL OR status = ?)
                ORDER BY created_at DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(status)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(p)
            .await
        })
        .context("Failed to list contact messages")?;
        Ok(messages)
    }

    async fn update_status(
        &self,
        id: i64,
        status: ContactStatus,
        admin_notes: Option<&str>,
    ) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE contact_messages
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
        .context("Failed to update contact message")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::migrated_pool;
    use crate::models::ContactType;

    fn message(name: &str) -> NewContactMessage {
        NewContactMessage {
            name: name.to_string(),
            email: format!("{}@example.com", name),
            message_type: ContactType::Suggestion,
            message: "Please add Khobar listings".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_list_and_update() {
        let repo = SqlxContactRepository::new(migrated_pool().await);
        let first = repo.create(&message("first")).await.unwrap();
        repo.create(&message("second")).await.unwrap();
        assert_eq!(first.status, ContactStatus::New);

        let all = repo.list(None, 0, 100).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "second");

        repo.update_status(first.id, ContactStatus::Replied, Some("Answered by phone"))
            .await
            .unwrap();
        let updated = repo.get_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(updated.status, ContactStatus::Replied);
        assert_eq!(updated.admin_notes.as_deref(), Some("Answered by phone"));

        repo.update_status(first.id, ContactStatus::Closed, None).await.unwrap();
        let closed = repo.get_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(closed.admin_notes.as_deref(), Some("Answered by phone"));

        let new_only = repo.list(Some(ContactStatus::New), 0, 100).await.unwrap();
        assert_eq!(new_only.len(), 1);
        assert_eq!(new_only[0].name, "second");
    }
}
