//! Plan and subscription service
//!
//! There is no payment gateway: subscribing creates a `pending` subscription
//! and the client confirms it with a transaction id. Only one subscription
//! may be in force per user.

use crate::db::repositories::{PlanRepository, SubscriptionRepository};
use crate::models::{
    NewPlan, NewSubscription, PaymentStatus, Plan, Subscription, SubscriptionStatus, SubscriptionWithNames,
};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const DEFAULT_PAYMENT_METHOD: &str = "credit_card";

#[derive(Debug, thiserror::Error)]
pub enum PlanServiceError {
    #[error("Plan not found")]
    PlanNotFound,

    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PlanService {
    plans: Arc<dyn PlanRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl PlanService {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            plans,
            subscriptions,
        }
    }

    /// Plans ordered by price; `active_only` hides retired plans
    pub async fn list(&self, active_only: bool) -> Result<Vec<Plan>, PlanServiceError> {
        Ok(self.plans.list(active_only).await.context("Failed to list plans")?)
    }

    pub async fn get(&self, id: i64) -> Result<Plan, PlanServiceError> {
        self.plans
            .get_by_id(id)
            .await?
            .ok_or(PlanServiceError::PlanNotFound)
    }

    pub async fn update_price(&self, id: i64, price: f64) -> Result<(), PlanServiceError> {
        if !price.is_finite() || price < 0.0 {
            return Err(PlanServiceError::ValidationError(
                "Price must be zero or positive".to_string(),
            ));
        }
        if !self.plans.update_price(id, price).await? {
            return Err(PlanServiceError::PlanNotFound);
        }
        tracing::info!(plan_id = id, price, "Plan price updated");
        Ok(())
    }

    /// Start a subscription awaiting payment
    pub async fn subscribe(
        &self,
        user_id: i64,
        plan_id: i64,
        payment_method: Option<String>,
    ) -> Result<SubscriptionWithNames, PlanServiceError> {
        let plan = self.get(plan_id).await?;
        if !plan.is_active {
            return Err(PlanServiceError::ValidationError(
                "This plan is no longer available".to_string(),
            ));
        }

        let now = Utc::now();
        if self.subscriptions.find_in_force(user_id, now).await?.is_some() {
            return Err(PlanServiceError::ValidationError(
                "You already have an active subscription".to_string(),
            ));
        }

        let subscription = self
            .subscriptions
            .create(&NewSubscription {
                user_id,
                plan_id: plan.id,
                start_date: now,
                end_date: now + Duration::days(plan.duration_days),
                amount: plan.price,
                payment_method: Some(
                    payment_method.unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string()),
                ),
            })
            .await
            .context("Failed to create subscription")?;

        tracing::info!(subscription_id = subscription.id, user_id, plan_id, "Subscription created");
        Ok(SubscriptionWithNames {
            subscription,
            plan_name: Some(plan.name),
            user_name: None,
            user_email: None,
        })
    }

    pub async fn my_subscriptions(
        &self,
        user_id: i64,
    ) -> Result<Vec<SubscriptionWithNames>, PlanServiceError> {
        Ok(self.subscriptions.list_by_user(user_id).await?)
    }

    pub async fn active_subscription(
        &self,
        user_id: i64,
    ) -> Result<Option<SubscriptionWithNames>, PlanServiceError> {
        Ok(self.subscriptions.find_in_force(user_id, Utc::now()).await?)
    }

    /// Record payment: only a pending payment can be confirmed. The period
    /// restarts at confirmation time.
    pub async fn confirm_payment(
        &self,
        user_id: i64,
        subscription_id: i64,
        transaction_id: &str,
    ) -> Result<Subscription, PlanServiceError> {
        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(PlanServiceError::ValidationError(
                "Transaction id is required".to_string(),
            ));
        }

        let mut subscription = self.owned(user_id, subscription_id).await?;
        if subscription.payment_status != PaymentStatus::Pending
            || subscription.status != SubscriptionStatus::Pending
        {
            return Err(PlanServiceError::ValidationError(
                "Only pending payments can be confirmed".to_string(),
            ));
        }

        let now = Utc::now();
        if self.subscriptions.find_in_force(user_id, now).await?.is_some() {
            return Err(PlanServiceError::ValidationError(
                "You already have an active subscription".to_string(),
            ));
        }

        let duration_days = match subscription.plan_id {
            Some(plan_id) => self.plans.get_by_id(plan_id).await?.map(|p| p.duration_days),
            None => None,
        }
        .unwrap_or_else(|| (subscription.end_date - subscription.start_date).num_days());

        subscription.status = SubscriptionStatus::Active;
        subscription.payment_status = PaymentStatus::Paid;
        subscription.transaction_id = Some(transaction_id.to_string());
        subscription.start_date = now;
        subscription.end_date = now + Duration::days(duration_days);

        let updated = self
            .subscriptions
            .update(&subscription)
            .await
            .context("Failed to confirm payment")?;

        tracing::info!(subscription_id, user_id, "Payment confirmed");
        Ok(updated)
    }

    /// Cancel a pending or active subscription
    pub async fn cancel(
        &self,
        user_id: i64,
        subscription_id: i64,
    ) -> Result<Subscription, PlanServiceError> {
        let mut subscription = self.owned(user_id, subscription_id).await?;
        if !matches!(
            subscription.status,
            SubscriptionStatus::Pending | SubscriptionStatus::Active
        ) {
            return Err(PlanServiceError::ValidationError(format!(
                "Cannot cancel a {} subscription",
                subscription.status
            )));
        }

        subscription.status = SubscriptionStatus::Cancelled;
        let updated = self
            .subscriptions
            .update(&subscription)
            .await
            .context("Failed to cancel subscription")?;
        tracing::info!(subscription_id, user_id, "Subscription cancelled");
        Ok(updated)
    }

    /// Admin list with user and plan names
    pub async fn list_all_subscriptions(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<SubscriptionWithNames>, PlanServiceError> {
        Ok(self.subscriptions.list_all(offset, limit).await?)
    }

    /// Insert the default tiers when the plan table is empty
    pub async fn init_defaults(&self) -> Result<usize, PlanServiceError> {
        if self.plans.count().await? > 0 {
            return Ok(0);
        }
        let defaults = NewPlan::defaults();
        for plan in &defaults {
            self.plans
                .create(plan)
                .await
                .with_context(|| format!("Failed to create plan {}", plan.name))?;
        }
        tracing::info!(count = defaults.len(), "Default plans created");
        Ok(defaults.len())
    }

    /// Expire active subscriptions whose period ended before `now`
    pub async fn expire_lapsed(&self, now: DateTime<Utc>) -> Result<u64, PlanServiceError> {
        Ok(self.subscriptions.expire_lapsed(now).await?)
    }

    /// Subscription that belongs to `user_id`; someone else's is not found
    async fn owned(
        &self,
        user_id: i64,
        subscription_id: i64,
    ) -> Result<Subscription, PlanServiceError> {
        self.subscriptions
            .get_by_id(subscription_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or(PlanServiceError::SubscriptionNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::{insert_user, migrated_pool};
    use crate::db::repositories::{SqlxPlanRepository, SqlxSubscriptionRepository};
    use crate::models::{NewPlan, UserRole};

    #[tokio::test]
    async fn test_init_defaults_only_fills_empty_table() {
        let pool = migrated_pool().await;
        let service = PlanService::new(
            SqlxPlanRepository::boxed(pool.clone()),
            SqlxSubscriptionRepository::boxed(pool),
        );

        assert_eq!(service.init_defaults().await.unwrap(), 3);
        assert_eq!(service.init_defaults().await.unwrap(), 0);

        let plans = service.list(false).await.unwrap();
        let prices: Vec<f64> = plans.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![199.0, 499.0, 999.0]);
        assert_eq!(plans[2].max_ads, None);
    }

    async fn setup() -> (PlanService, Vec<Plan>, i64, i64) {
        let pool = migrated_pool().await;
        let plans = SqlxPlanRepository::new(pool.clone());
        let mut created = Vec::new();
        for plan in NewPlan::defaults() {
            created.push(plans.create(&plan).await.unwrap());
        }
        let user = insert_user(&pool, "advertiser", UserRole::Advertiser).await;
        let other = insert_user(&pool, "other", UserRole::Advertiser).await;
        let service = PlanService::new(
            SqlxPlanRepository::boxed(pool.clone()),
            SqlxSubscriptionRepository::boxed(pool),
        );
        (service, created, user.id, other.id)
    }

    #[tokio::test]
    async fn test_list_and_price_update() {
        let (service, plans, _, _) = setup().await;

        let listed = service.list(true).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.windows(2).all(|w| w[0].price <= w[1].price));

        service.update_price(plans[0].id, 149.0).await.unwrap();
        assert_eq!(service.get(plans[0].id).await.unwrap().price, 149.0);
        assert!(matches!(
            service.update_price(plans[0].id, -5.0).await,
            Err(PlanServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.update_price(9999, 10.0).await,
            Err(PlanServiceError::PlanNotFound)
        ));
    }

    #[tokio::test]
    async fn test_subscribe_confirm_and_block_second() {
        let (service, plans, user_id, _) = setup().await;
        let silver = &plans[1];

        let created = service.subscribe(user_id, silver.id, None).await.unwrap();
        let sub = &created.subscription;
        assert_eq!(sub.status, SubscriptionStatus::Pending);
        assert_eq!(sub.payment_status, PaymentStatus::Pending);
        assert_eq!(sub.amount, silver.price);
        assert_eq!(sub.payment_method.as_deref(), Some(DEFAULT_PAYMENT_METHOD));
        assert_eq!((sub.end_date - sub.start_date).num_days(), silver.duration_days);
        assert!(service.active_subscription(user_id).await.unwrap().is_none());

        let confirmed = service
            .confirm_payment(user_id, sub.id, "TX-1001")
            .await
            .unwrap();
        assert_eq!(confirmed.status, SubscriptionStatus::Active);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
        assert_eq!(confirmed.transaction_id.as_deref(), Some("TX-1001"));

        let active = service.active_subscription(user_id).await.unwrap().unwrap();
        assert_eq!(active.subscription.id, sub.id);
        assert_eq!(active.plan_name.as_deref(), Some("فضي"));

        assert!(matches!(
            service.subscribe(user_id, plans[2].id, None).await,
            Err(PlanServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.confirm_payment(user_id, sub.id, "TX-1002").await,
            Err(PlanServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_requires_owner() {
        let (service, plans, user_id, other_id) = setup().await;
        let created = service.subscribe(user_id, plans[0].id, Some("mada".into())).await.unwrap();

        assert!(matches!(
            service.confirm_payment(other_id, created.subscription.id, "TX").await,
            Err(PlanServiceError::SubscriptionNotFound)
        ));
        assert!(matches!(
            service.confirm_payment(user_id, created.subscription.id, "  ").await,
            Err(PlanServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel() {
        let (service, plans, user_id, _) = setup().await;
        let created = service.subscribe(user_id, plans[0].id, None).await.unwrap();
        let id = created.subscription.id;

        let cancelled = service.cancel(user_id, id).await.unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert!(matches!(
            service.cancel(user_id, id).await,
            Err(PlanServiceError::ValidationError(_))
        ));

        // a cancelled subscription does not block a new one
        assert!(service.subscribe(user_id, plans[1].id, None).await.is_ok());
        assert_eq!(service.my_subscriptions(user_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_expire_lapsed() {
        let (service, plans, user_id, _) = setup().await;
        let created = service.subscribe(user_id, plans[0].id, None).await.unwrap();
        service
            .confirm_payment(user_id, created.subscription.id, "TX")
            .await
            .unwrap();

        let later = Utc::now() + Duration::days(plans[0].duration_days + 1);
        assert_eq!(service.expire_lapsed(later).await.unwrap(), 1);
        let all = service.list_all_subscriptions(0, 100).await.unwrap();
        assert_eq!(all[0].subscription.status, SubscriptionStatus::Expired);
        assert_eq!(all[0].user_email.as_deref(), Some("advertiser@kitchentech.sa"));
    }

    #[tokio::test]
    async fn test_missing_plan() {
        let (service, _, user_id, _) = setup().await;
        assert!(matches!(
            service.subscribe(user_id, 4242, None).await,
            Err(PlanServiceError::PlanNotFound)
        ));
    }
}
