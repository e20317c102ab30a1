//! Admin service
//!
//! Dashboard figures and account moderation. Listing review, plan pricing and
//! the subscription overview live in their own services.

use crate::db::repositories::{
    ListingRepository, SubscriptionRepository, UserRepository,
};
use crate::models::{
    ListingStatus, SubscriptionStatus, User, UserRole, UserStatus, UserWithAdsCount,
};
use crate::services::validation::{is_valid_email, non_blank, normalize_phone, INVALID_PHONE_MESSAGE};
use anyhow::Context;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AdminServiceError {
    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_clients: i64,
    pub total_advertisers: i64,
    pub total_listings: i64,
    pub active_listings: i64,
    pub pending_listings: i64,
    pub approved_listings: i64,
    pub rejected_listings: i64,
    pub total_subscriptions: i64,
    pub active_subscriptions: i64,
    pub monthly_revenue: f64,
}

/// Admin edit of an account; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserAdminUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<UserStatus>,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
}

/// Midnight UTC on the first day of `now`'s month
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

pub struct AdminService {
    users: Arc<dyn UserRepository>,
    listings: Arc<dyn ListingRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl AdminService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        listings: Arc<dyn ListingRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            users,
            listings,
            subscriptions,
        }
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, AdminServiceError> {
        let approved = self
            .listings
            .count_by_status(Some(ListingStatus::Approved))
            .await?;

        Ok(DashboardStats {
            total_users: self.users.count_by_role(None).await?,
            total_clients: self.users.count_by_role(Some(UserRole::Client)).await?,
            total_advertisers: self.users.count_by_role(Some(UserRole::Advertiser)).await?,
            total_listings: self.listings.count_by_status(None).await?,
            active_listings: approved,
            pending_listings: self
                .listings
                .count_by_status(Some(ListingStatus::Pending))
                .await?,
            approved_listings: approved,
            rejected_listings: self
                .listings
                .count_by_status(Some(ListingStatus::Rejected))
                .await?,
            total_subscriptions: self.subscriptions.count(None).await?,
            active_subscriptions: self
                .subscriptions
                .count(Some(SubscriptionStatus::Active))
                .await?,
            monthly_revenue: self
                .subscriptions
                .revenue_since(month_start(Utc::now()))
                .await
                .context("Failed to compute monthly revenue")?,
        })
    }

    pub async fn list_users(
        &self,
        role: Option<UserRole>,
        status: Option<UserStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<UserWithAdsCount>, AdminServiceError> {
        Ok(self.users.list(role, status, offset, limit).await?)
    }

    pub async fn get_user(&self, id: i64) -> Result<User, AdminServiceError> {
        self.users
            .get_by_id(id)
            .await?
            .ok_or(AdminServiceError::UserNotFound)
    }

    pub async fn update_user(
        &self,
        id: i64,
        update: UserAdminUpdate,
    ) -> Result<User, AdminServiceError> {
        let mut user = self.get_user(id).await?;

        if let Some(email) = update.email {
            let email = email.trim().to_lowercase();
            if !is_valid_email(&email) {
                return Err(AdminServiceError::ValidationError(
                    "Invalid email address".to_string(),
                ));
            }
            if let Some(other) = self.users.get_by_email(&email).await? {
                if other.id != user.id {
                    return Err(AdminServiceError::Conflict(
                        "Email already registered".to_string(),
                    ));
                }
            }
            user.email = email;
        }
        if let Some(phone) = update.phone {
            let phone = normalize_phone(&phone).ok_or_else(|| {
                AdminServiceError::ValidationError(INVALID_PHONE_MESSAGE.to_string())
            })?;
            if let Some(other) = self.users.get_by_phone(&phone).await? {
                if other.id != user.id {
                    return Err(AdminServiceError::Conflict(
                        "Phone number already registered".to_string(),
                    ));
                }
            }
            user.phone = Some(phone);
        }
        if let Some(full_name) = update.full_name {
            user.full_name = non_blank(Some(full_name));
        }
        if let Some(company_name) = update.company_name {
            user.company_name = non_blank(Some(company_name));
        }
        if let Some(company_address) = update.company_address {
            user.company_address = non_blank(Some(company_address));
        }
        if let Some(status) = update.status {
            user.set_status(status);
        }

        let updated = self
            .users
            .update(&user)
            .await
            .context("Failed to update user")?;
        tracing::info!(user_id = id, status = %updated.status, "User updated by admin");
        Ok(updated)
    }

    pub async fn ban(&self, admin: &User, id: i64) -> Result<User, AdminServiceError> {
        self.change_status(admin, id, UserStatus::Banned).await
    }

    pub async fn unban(&self, admin: &User, id: i64) -> Result<User, AdminServiceError> {
        self.change_status(admin, id, UserStatus::Active).await
    }

    pub async fn suspend(&self, admin: &User, id: i64) -> Result<User, AdminServiceError> {
        self.change_status(admin, id, UserStatus::Suspended).await
    }

    async fn change_status(
        &self,
        admin: &User,
        id: i64,
        status: UserStatus,
    ) -> Result<User, AdminServiceError> {
        let mut user = self.get_user(id).await?;
        if user.id == admin.id && status != UserStatus::Active {
            return Err(AdminServiceError::ValidationError(
                "You cannot change your own account status".to_string(),
            ));
        }

        user.set_status(status);
        let updated = self
            .users
            .update(&user)
            .await
            .context("Failed to update user status")?;
        tracing::warn!(user_id = id, admin_id = admin.id, status = %status, "User status changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::{insert_listing, insert_user, migrated_pool};
    use crate::db::repositories::{
        PlanRepository, SqlxListingRepository, SqlxPlanRepository, SqlxSubscriptionRepository,
        SqlxUserRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::{NewPlan, NewSubscription, PaymentStatus};
    use chrono::Duration;

    fn service(pool: &DynDatabasePool) -> AdminService {
        AdminService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxListingRepository::boxed(pool.clone()),
            SqlxSubscriptionRepository::boxed(pool.clone()),
        )
    }

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2024, 3, 17, 15, 30, 0).unwrap();
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let pool = migrated_pool().await;
        let admin = insert_user(&pool, "admin", UserRole::Admin).await;
        let seller = insert_user(&pool, "seller", UserRole::Advertiser).await;
        insert_user(&pool, "buyer", UserRole::Client).await;
        insert_listing(&pool, seller.id, "Approved kitchen", ListingStatus::Approved).await;
        insert_listing(&pool, seller.id, "Pending kitchen", ListingStatus::Pending).await;
        insert_listing(&pool, seller.id, "Rejected kitchen", ListingStatus::Rejected).await;

        let plans = SqlxPlanRepository::new(pool.clone());
        let plan = plans.create(&NewPlan::defaults()[0]).await.unwrap();
        let subscriptions = SqlxSubscriptionRepository::new(pool.clone());
        let now = Utc::now();
        let mut paid = subscriptions
            .create(&NewSubscription {
                user_id: seller.id,
                plan_id: plan.id,
                start_date: now,
                end_date: now + Duration::days(30),
                amount: 199.0,
                payment_method: None,
            })
            .await
            .unwrap();
        paid.status = SubscriptionStatus::Active;
        paid.payment_status = PaymentStatus::Paid;
        subscriptions.update(&paid).await.unwrap();
        subscriptions
            .create(&NewSubscription {
                user_id: admin.id,
                plan_id: plan.id,
                start_date: now,
                end_date: now + Duration::days(30),
                amount: 499.0,
                payment_method: None,
            })
            .await
            .unwrap();

        let stats = service(&pool).dashboard_stats().await.unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.total_clients, 1);
        assert_eq!(stats.total_advertisers, 1);
        assert_eq!(stats.total_listings, 3);
        assert_eq!(stats.active_listings, 1);
        assert_eq!(stats.approved_listings, 1);
        assert_eq!(stats.pending_listings, 1);
        assert_eq!(stats.rejected_listings, 1);
        assert_eq!(stats.total_subscriptions, 2);
        assert_eq!(stats.active_subscriptions, 1);
        assert_eq!(stats.monthly_revenue, 199.0);
    }

    #[tokio::test]
    async fn test_ban_unban_suspend() {
        let pool = migrated_pool().await;
        let admin = insert_user(&pool, "admin", UserRole::Admin).await;
        let user = insert_user(&pool, "seller", UserRole::Advertiser).await;
        let service = service(&pool);

        let banned = service.ban(&admin, user.id).await.unwrap();
        assert_eq!(banned.status, UserStatus::Banned);
        assert!(!banned.is_active);

        let restored = service.unban(&admin, user.id).await.unwrap();
        assert_eq!(restored.status, UserStatus::Active);
        assert!(restored.is_active);

        let suspended = service.suspend(&admin, user.id).await.unwrap();
        assert_eq!(suspended.status, UserStatus::Suspended);
        assert!(!suspended.can_login());

        assert!(matches!(
            service.ban(&admin, admin.id).await,
            Err(AdminServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.suspend(&admin, 999).await,
            Err(AdminServiceError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_user() {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "seller", UserRole::Advertiser).await;
        insert_user(&pool, "other", UserRole::Client).await;
        let service = service(&pool);

        let updated = service
            .update_user(
                user.id,
                UserAdminUpdate {
                    full_name: Some("Kitchen Co".into()),
                    phone: Some("055 111 2222".into()),
                    status: Some(UserStatus::Banned),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Kitchen Co"));
        assert_eq!(updated.phone.as_deref(), Some("0551112222"));
        assert!(!updated.is_active);

        assert!(matches!(
            service
                .update_user(
                    user.id,
                    UserAdminUpdate {
                        email: Some("other@kitchentech.sa".into()),
                        ..Default::default()
                    },
                )
                .await,
            Err(AdminServiceError::Conflict(_))
        ));

        let users = service.list_users(None, Some(UserStatus::Banned), 0, 100).await.unwrap();
        assert_eq!(users.len(), 1);
    }
}
