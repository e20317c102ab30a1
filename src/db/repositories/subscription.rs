//! Subscription repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    NewSubscription, PaymentStatus, Subscription, SubscriptionStatus, SubscriptionWithNames,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const WITH_NAMES: &str = r#"
    SELECT s.*,
           p.name AS plan_name,
           COALESCE(u.full_name, u.username) AS user_name,
           u.email AS user_email
    FROM subscriptions s
    LEFT JOIN plans p ON p.id = s.plan_id
    LEFT JOIN users u ON u.id = s.user_id
"#;

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert a subscription awaiting payment
    async fn create(&self, subscription: &NewSubscription) -> Result<Subscription>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Subscription>>;

    /// A user's subscriptions, newest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<SubscriptionWithNames>>;

    /// The user's active subscription whose end date is after `now`
    async fn find_in_force(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionWithNames>>;

    /// Persist status, payment and period columns
    async fn update(&self, subscription: &Subscription) -> Result<Subscription>;

    /// Every subscription, newest first (admin)
    async fn list_all(&self, offset: i64, limit: i64) -> Result<Vec<SubscriptionWithNames>>;

    async fn count(&self, status: Option<SubscriptionStatus>) -> Result<i64>;

    /// Sum of paid amounts for subscriptions created at or after `since`
    async fn revenue_since(&self, since: DateTime<Utc>) -> Result<f64>;

    /// Mark active subscriptions past their end date as expired
    async fn expire_lapsed(&self, now: DateTime<Utc>) -> Result<u64>;
}

pub struct SqlxSubscriptionRepository {
    pool: DynDatabasePool,
}

impl SqlxSubscriptionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SubscriptionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SubscriptionRepository for SqlxSubscriptionRepository {
    async fn create(&self, subscription: &NewSubscription) -> Result<Subscription> {
        let now = Utc::now();
        let sql = r#"
            INSERT INTO subscriptions (user_id, plan_id, status, payment_status, start_date,
                                       end_date, amount, payment_method, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        let status = SubscriptionStatus::Pending.as_str();
        let payment_status = PaymentStatus::Pending.as_str();

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(subscription.user_id)
                .bind(subscription.plan_id)
                .bind(status)
                .bind(payment_status)
                .bind(subscription.start_date)
                .bind(subscription.end_date)
                .bind(subscription.amount)
                .bind(&subscription.payment_method)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(subscription.user_id)
                .bind(subscription.plan_id)
                .bind(status)
                .bind(payment_status)
                .bind(subscription.start_date)
                .bind(subscription.end_date)
                .bind(subscription.amount)
                .bind(&subscription.payment_method)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create subscription")?;

        self.get_by_id(id)
            .await?
            .context("Subscription disappeared after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Subscription>> {
        let subscription = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = ?")
                .bind(id)
                .fetch_optional(p)
                .await
        })
        .context("Failed to get subscription")?;
        Ok(subscription)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<SubscriptionWithNames>> {
        let sql = format!(
            "{} WHERE s.user_id = ? ORDER BY s.created_at DESC, s.id DESC",
            WITH_NAMES
        );
        let subscriptions = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, SubscriptionWithNames>(&sql)
                .bind(user_id)
                .fetch_all(p)
                .await
        })
        .context("Failed to list user subscriptions")?;
        Ok(subscriptions)
    }

    async fn find_in_force(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionWithNames>> {
        let sql = format!(
            "{} WHERE s.user_id = ? AND s.status = ? AND s.end_date > ? \
             ORDER BY s.end_date DESC LIMIT 1",
            WITH_NAMES
        );
        let subscription = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, SubscriptionWithNames>(&sql)
                .bind(user_id)
                .bind(SubscriptionStatus::Active.as_str())
                .bind(now)
                .fetch_optional(p)
                .await
        })
        .context("Failed to find subscription in force")?;
        Ok(subscription)
    }

    async fn update(&self, subscription: &Subscription) -> Result<Subscription> {
        let now = Utc::now();
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE subscriptions SET
                    status = ?, payment_status = ?, start_date = ?, end_date = ?,
                    transaction_id = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(subscription.status.as_str())
            .bind(subscription.payment_status.as_str())
            .bind(subscription.start_date)
            .bind(subscription.end_date)
            .bind(&subscription.transaction_id)
            .bind(now)
            .bind(subscription.id)
            .execute(p)
            .await
            .map(|_| ())
        })
        .context("Failed to update subscription")?;

        Ok(Subscription {
            updated_at: now,
            ..subscription.clone()
        })
    }

    async fn list_all(&self, offset: i64, limit: i64) -> Result<Vec<SubscriptionWithNames>> {
        let sql = format!(
            "{} ORDER BY s.created_at DESC, s.id DESC LIMIT ? OFFSET ?",
            WITH_NAMES
        );
        let subscriptions = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, SubscriptionWithNames>(&sql)
                .bind(limit)
                .bind(offset)
                .fetch_all(p)
                .await
        })
        .context("Failed to list subscriptions")?;
        Ok(subscriptions)
    }

    async fn count(&self, status: Option<SubscriptionStatus>) -> Result<i64> {
        let status = status.map(|s| s.as_str());
        let count = with_pool!(self.pool, |p| {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM subscriptions WHERE (? IS NULL OR status = ?)",
            )
            .bind(status)
            .bind(status)
            .fetch_one(p)
            .await
        })
        .context("Failed to count subscriptions")?;
        Ok(count)
    }

    async fn revenue_since(&self, since: DateTime<Utc>) -> Result<f64> {
        let total = with_pool!(self.pool, |p| {
            sqlx::query_scalar::<_, Option<f64>>(
                "SELECT SUM(amount) FROM subscriptions WHERE payment_status = ? AND created_at >= ?",
            )
            .bind(PaymentStatus::Paid.as_str())
            .bind(since)
            .fetch_one(p)
            .await
        })
        .context("Failed to sum revenue")?;
        Ok(total.unwrap_or(0.0))
    }

    async fn expire_lapsed(&self, now: DateTime<Utc>) -> Result<u64> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query(
                "UPDATE subscriptions SET status = ?, updated_at = ? WHERE status = ? AND end_date <= ?",
            )
            .bind(SubscriptionStatus::Expired.as_str())
            .bind(now)
            .bind(SubscriptionStatus::Active.as_str())
            .bind(now)
            .execute(p)
            .await
            .map(|r| r.rows_affected())
        })
        .context("Failed to expire subscriptions")?;
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::{insert_user, migrated_pool};
    use crate::db::repositories::{PlanRepository, SqlxPlanRepository};
    use crate::models::{NewPlan, UserRole};
    use chrono::Duration;

    async fn setup() -> (SqlxSubscriptionRepository, i64, i64) {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "subscriber", UserRole::Advertiser).await;
        let plan = SqlxPlanRepository::new(pool.clone())
            .create(&NewPlan::defaults()[1])
            .await
            .unwrap();
        (SqlxSubscriptionRepository::new(pool), user.id, plan.id)
    }

    fn new_subscription(user_id: i64, plan_id: i64, days: i64) -> NewSubscription {
        let start = Utc::now();
        NewSubscription {
            user_id,
            plan_id,
            start_date: start,
            end_date: start + Duration::days(days),
            amount: 499.0,
            payment_method: Some("credit_card".to_string()),
        }
    }

    async fn activate(repo: &SqlxSubscriptionRepository, mut sub: Subscription) -> Subscription {
        sub.status = SubscriptionStatus::Active;
        sub.payment_status = PaymentStatus::Paid;
        repo.update(&sub).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_pending() {
        let (repo, user_id, plan_id) = setup().await;

        let sub = repo.create(&new_subscription(user_id, plan_id, 30)).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert_eq!(sub.payment_status, PaymentStatus::Pending);
        assert_eq!(sub.amount, 499.0);

        let mine = repo.list_by_user(user_id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].plan_name.as_deref(), Some("فضي"));
        assert_eq!(mine[0].user_name.as_deref(), Some("subscriber"));
    }

    #[tokio::test]
    async fn test_find_in_force() {
        let (repo, user_id, plan_id) = setup().await;
        let pending = repo.create(&new_subscription(user_id, plan_id, 30)).await.unwrap();
        assert!(repo.find_in_force(user_id, Utc::now()).await.unwrap().is_none());

        let active = activate(&repo, pending).await;
        let found = repo.find_in_force(user_id, Utc::now()).await.unwrap();
        assert_eq!(found.map(|s| s.subscription.id), Some(active.id));

        let later = Utc::now() + Duration::days(31);
        assert!(repo.find_in_force(user_id, later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_counts_and_revenue() {
        let (repo, user_id, plan_id) = setup().await;
        let first = repo.create(&new_subscription(user_id, plan_id, 30)).await.unwrap();
        activate(&repo, first).await;
        repo.create(&new_subscription(user_id, plan_id, 30)).await.unwrap();

        assert_eq!(repo.count(None).await.unwrap(), 2);
        assert_eq!(repo.count(Some(SubscriptionStatus::Active)).await.unwrap(), 1);

        let since = Utc::now() - Duration::days(1);
        assert_eq!(repo.revenue_since(since).await.unwrap(), 499.0);
        let future = Utc::now() + Duration::days(1);
        assert_eq!(repo.revenue_since(future).await.unwrap(), 0.0);

        assert_eq!(repo.list_all(0, 100).await.unwrap().len(), 2);
        assert_eq!(repo.list_all(1, 100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expire_lapsed() {
        let (repo, user_id, plan_id) = setup().await;
        let short = repo.create(&new_subscription(user_id, plan_id, 1)).await.unwrap();
        let short = activate(&repo, short).await;

        assert_eq!(repo.expire_lapsed(Utc::now()).await.unwrap(), 0);
        let expired = repo
            .expire_lapsed(Utc::now() + Duration::days(2))
            .await
            .unwrap();
        assert_eq!(expired, 1);
        let reloaded = repo.get_by_id(short.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, SubscriptionStatus::Expired);
    }
}
