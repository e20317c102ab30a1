//! Database repositories
//!
//! One repository per aggregate. Each exposes an `#[async_trait]` trait and a
//! `Sqlx*Repository` implementation that works on SQLite and MySQL.
//!
//! Statements are written once with `?` placeholders, which both drivers
//! accept; `with_pool!` expands the query body once per backend so the
//! concrete sqlx types line up.

/// Run `$body` with `$p` bound to the concrete pool of the active driver.
macro_rules! with_pool {
    ($pool:expr, |$p:ident| $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $p = $pool.sqlite()?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $p = $pool.mysql()?;
                $body
            }
        }
    };
}

pub mod contact;
pub mod favorite;
pub mod listing;
pub mod login_log;
pub mod plan;
pub mod quote;
pub mod settings;
pub mod subscription;
pub mod user;

pub use contact::{ContactRepository, SqlxContactRepository};
pub use favorite::{FavoriteRepository, SqlxFavoriteRepository};
pub use listing::{ListingImageRepository, ListingRepository, SqlxListingImageRepository, SqlxListingRepository};
pub use login_log::{LoginLogRepository, SqlxLoginLogRepository};
pub use plan::{PlanRepository, SqlxPlanRepository};
pub use quote::{QuoteRepository, SqlxQuoteRepository};
pub use settings::{SiteSettingRepository, SqlxSiteSettingRepository};
pub use subscription::{SqlxSubscriptionRepository, SubscriptionRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Test fixtures shared by repository and service tests
#[cfg(test)]
pub(crate) mod fixtures {
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Listing, ListingStatus, NewListing, NewUser, User, UserRole};

    use super::{ListingRepository, SqlxListingRepository, SqlxUserRepository, UserRepository};

    pub async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    pub async fn insert_user(pool: &DynDatabasePool, name: &str, role: UserRole) -> User {
        SqlxUserRepository::new(pool.clone())
            .create(&NewUser {
                email: format!("{}@kitchentech.sa", name),
                username: name.to_string(),
                password_hash: "hash".to_string(),
                full_name: None,
                phone: None,
                role,
            })
            .await
            .expect("Failed to create user")
    }

    pub fn new_listing(owner_id: i64, title: &str, city: &str, price: f64) -> NewListing {
        NewListing {
            title: title.to_string(),
            price,
            city: city.to_string(),
            owner_id,
            ..Default::default()
        }
    }

    pub async fn insert_listing(
        pool: &DynDatabasePool,
        owner_id: i64,
        title: &str,
        status: ListingStatus,
    ) -> Listing {
        let repo = SqlxListingRepository::new(pool.clone());
        let mut listing = repo
            .create(&new_listing(owner_id, title, "riyadh", 1000.0))
            .await
            .expect("Failed to create listing");
        if listing.status != status {
            listing.status = status;
            listing = repo.update(&listing).await.expect("Failed to update listing");
        }
        listing
    }
}
