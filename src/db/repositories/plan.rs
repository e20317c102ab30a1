//! Plan repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{NewPlan, Plan};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn create(&self, plan: &NewPlan) -> Result<Plan>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Plan>>;

    /// Plans ordered by price; `active_only` hides retired plans
    async fn list(&self, active_only: bool) -> Result<Vec<Plan>>;

    /// Change the price; returns `false` when the plan does not exist
    async fn update_price(&self, id: i64, price: f64) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxPlanRepository {
    pool: DynDatabasePool,
}

impl SqlxPlanRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PlanRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PlanRepository for SqlxPlanRepository {
    async fn create(&self, plan: &NewPlan) -> Result<Plan> {
        let now = Utc::now();
        let sql = r#"
            INSERT INTO plans (name, name_en, plan_type, price, duration_days, max_ads,
                               featured_ads, priority_support, description, is_active,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE, ?, ?)
        "#;

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&plan.name)
                .bind(&plan.name_en)
                .bind(plan.plan_type.as_str())
                .bind(plan.price)
                .bind(plan.duration_days)
                .bind(plan.max_ads)
                .bind(plan.featured_ads)
                .bind(plan.priority_support)
                .bind(&plan.description)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&plan.name)
                .bind(&plan.name_en)
                .bind(plan.plan_type.as_str())
                .bind(plan.price)
                .bind(plan.duration_days)
                .bind(plan.max_ads)
                .bind(plan.featured_ads)
                .bind(plan.priority_support)
                .bind(&plan.description)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create plan")?;

        self.get_by_id(id)
            .await?
            .context("Plan disappeared after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Plan>> {
        let plan = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = ?")
                .bind(id)
                .fetch_optional(p)
                .await
        })
        .context("Failed to get plan")?;
        Ok(plan)
    }

    async fn list(&self, active_only: bool) -> Result<Vec<Plan>> {
        let plans = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, Plan>(
                "SELECT * FROM plans WHERE (? = FALSE OR is_active = TRUE) ORDER BY price, id",
            )
            .bind(active_only)
            .fetch_all(p)
            .await
        })
        .context("Failed to list plans")?;
        Ok(plans)
    }

    async fn update_price(&self, id: i64, price: f64) -> Result<bool> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query("UPDATE plans SET price = ?, updated_at = ? WHERE id = ?")
                .bind(price)
                .bind(Utc::now())
                .bind(id)
                .execute(p)
                .await
                .map(|r| r.rows_affected())
        })
        .context("Failed to update plan price")?;
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count = with_pool!(self.pool, |p| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM plans")
                .fetch_one(p)
                .await
        })
        .context("Failed to count plans")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::migrated_pool;
    use crate::models::PlanType;

    #[tokio::test]
    async fn test_create_and_list_by_price() {
        let pool = migrated_pool().await;
        let repo = SqlxPlanRepository::new(pool.clone());
        for plan in NewPlan::defaults().into_iter().rev() {
            repo.create(&plan).await.expect("Failed to create plan");
        }

        let plans = repo.list(true).await.unwrap();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].plan_type, PlanType::Bronze);
        assert_eq!(plans[2].plan_type, PlanType::Gold);
        assert!(plans[2].max_ads.is_none());
        assert_eq!(repo.count().await.unwrap(), 3);

        pool.execute(&format!("UPDATE plans SET is_active = FALSE WHERE id = {}", plans[0].id))
            .await
            .unwrap();
        assert_eq!(repo.list(true).await.unwrap().len(), 2);
        assert_eq!(repo.list(false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_price() {
        let pool = migrated_pool().await;
        let repo = SqlxPlanRepository::new(pool);
        let plan = repo.create(&NewPlan::defaults()[0]).await.unwrap();

        assert!(repo.update_price(plan.id, 249.5).await.unwrap());
        assert_eq!(repo.get_by_id(plan.id).await.unwrap().unwrap().price, 249.5);
        assert!(!repo.update_price(999, 1.0).await.unwrap());
    }
}
