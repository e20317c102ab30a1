//! Periodic housekeeping
//!
//! Clears lapsed featured flags, expires subscriptions past their end date
//! and prunes idle rate-limiter keys.

use crate::db::repositories::{ListingRepository, SubscriptionRepository};
use crate::services::rate_limiter::{LoginRateLimiter, SlidingWindow};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// How often the background task runs
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub features_expired: u64,
    pub subscriptions_expired: u64,
}

pub struct MaintenanceService {
    listings: Arc<dyn ListingRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    login_limiter: Arc<LoginRateLimiter>,
    lead_limiter: Arc<SlidingWindow<IpAddr>>,
}

impl MaintenanceService {
    pub fn new(
        listings: Arc<dyn ListingRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        login_limiter: Arc<LoginRateLimiter>,
        lead_limiter: Arc<SlidingWindow<IpAddr>>,
    ) -> Self {
        Self {
            listings,
            subscriptions,
            login_limiter,
            lead_limiter,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<MaintenanceReport> {
        let report = MaintenanceReport {
            features_expired: self.listings.expire_features(now).await?,
            subscriptions_expired: self.subscriptions.expire_lapsed(now).await?,
        };
        self.login_limiter.cleanup().await;
        self.lead_limiter.cleanup().await;

        if report != MaintenanceReport::default() {
            tracing::info!(
                features_expired = report.features_expired,
                subscriptions_expired = report.subscriptions_expired,
                "Maintenance pass completed"
            );
        }
        Ok(report)
    }

    /// Run forever at `MAINTENANCE_INTERVAL`; failures are logged and retried
    /// on the next tick
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = self.run_once(Utc::now()).await {
                tracing::warn!("Maintenance pass failed: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::{insert_listing, insert_user, migrated_pool};
    use crate::db::repositories::{SqlxListingRepository, SqlxSubscriptionRepository};
    use crate::models::{ListingStatus, UserRole};
    use crate::services::rate_limiter::lead_limiter;

    #[tokio::test]
    async fn test_run_once_expires_features() {
        let pool = migrated_pool().await;
        let owner = insert_user(&pool, "owner", UserRole::Advertiser).await;
        let mut listing = insert_listing(&pool, owner.id, "Kitchen", ListingStatus::Approved).await;
        let listings = SqlxListingRepository::new(pool.clone());
        listing.is_featured = true;
        listing.featured_until = Some(Utc::now() - chrono::Duration::days(1));
        listings.update(&listing).await.unwrap();

        let service = MaintenanceService::new(
            SqlxListingRepository::boxed(pool.clone()),
            SqlxSubscriptionRepository::boxed(pool.clone()),
            Arc::new(LoginRateLimiter::default()),
            Arc::new(lead_limiter()),
        );

        let report = service.run_once(Utc::now()).await.unwrap();
        assert_eq!(report.features_expired, 1);
        assert_eq!(report.subscriptions_expired, 0);

        let refreshed = listings.get_by_id(listing.id).await.unwrap().unwrap();
        assert!(!refreshed.is_featured);
        assert_eq!(service.run_once(Utc::now()).await.unwrap(), MaintenanceReport::default());
    }
}
