//! Favorite repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Favorite, FavoriteWithListing};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// Insert a favorite; fails on a duplicate (user, listing) pair
    async fn add(&self, user_id: i64, listing_id: i64) -> Result<Favorite>;

    async fn get(&self, user_id: i64, listing_id: i64) -> Result<Option<Favorite>>;

    async fn remove(&self, id: i64) -> Result<()>;

    /// A user's favorites with listing summaries, newest first
    async fn list_by_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FavoriteWithListing>>;
}

pub struct SqlxFavoriteRepository {
    pool: DynDatabasePool,
}

impl SqlxFavoriteRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FavoriteRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl FavoriteRepository for SqlxFavoriteRepository {
    async fn add(&self, user_id: i64, listing_id: i64) -> Result<Favorite> {
        let now = Utc::now();
        let sql = "INSERT INTO favorites (user_id, listing_id, created_at) VALUES (?, ?, ?)";

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(user_id)
                .bind(listing_id)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(user_id)
                .bind(listing_id)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to add favorite")?;

        Ok(Favorite {
            id,
            user_id,
            listing_id,
            created_at: now,
        })
    }

    async fn get(&self, user_id: i64, listing_id: i64) -> Result<Option<Favorite>> {
        let favorite = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, Favorite>(
                "SELECT * FROM favorites WHERE user_id = ? AND listing_id = ?",
            )
            .bind(user_id)
            .bind(listing_id)
            .fetch_optional(p)
            .await
        })
        .context("Failed to get favorite")?;
        Ok(favorite)
    }

    async fn remove(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM favorites WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to remove favorite")?;
        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FavoriteWithListing>> {
        let favorites = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, FavoriteWithListing>(
                r#"
                SELECT f.id, f.listing_id, f.created_at,
                       l.title, l.description, l.price, l.city,
                       l.status AS listing_status, l.listing_type, l.is_featured,
                       l.created_at AS listing_created_at,
                       COALESCE(u.full_name, u.username) AS owner_name,
                       (SELECT i.url FROM listing_images i
                         WHERE i.listing_id = l.id ORDER BY i.id LIMIT 1) AS image_url
                FROM favorites f
                JOIN listings l ON l.id = f.listing_id
                LEFT JOIN users u ON u.id = l.owner_id
                WHERE f.user_id = ?
                ORDER BY f.created_at DESC, f.id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(p)
            .await
        })
        .context("Failed to list favorites")?;
        Ok(favorites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::{insert_listing, insert_user, migrated_pool};
    use crate::db::repositories::{ListingImageRepository, SqlxListingImageRepository};
    use crate::models::{ListingStatus, NewListingImage, UserRole};

    #[tokio::test]
    async fn test_add_get_remove() {
        let pool = migrated_pool().await;
        let user = insert_user(&pool, "fan", UserRole::Client).await;
        let listing = insert_listing(&pool, user.id, "Kitchen", ListingStatus::Approved).await;
        let repo = SqlxFavoriteRepository::new(pool);

        let favorite = repo.add(user.id, listing.id).await.expect("Failed to add favorite");
        assert!(favorite.id > 0);
        assert!(repo.add(user.id, listing.id).await.is_err());

        let found = repo.get(user.id, listing.id).await.unwrap();
        assert_eq!(found.map(|f| f.id), Some(favorite.id));

        repo.remove(favorite.id).await.unwrap();
        assert!(repo.get(user.id, listing.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_includes_listing_summary_and_first_image() {
        let pool = migrated_pool().await;
        let owner = insert_user(&pool, "owner", UserRole::Advertiser).await;
        let fan = insert_user(&pool, "fan", UserRole::Client).await;
        let listing = insert_listing(&pool, owner.id, "Bright kitchen", ListingStatus::Approved).await;
        let images = SqlxListingImageRepository::new(pool.clone());
        for name in ["first.jpg", "second.jpg"] {
            images
                .create(&NewListingImage {
                    listing_id: listing.id,
                    url: format!("/media/listings/{}/{}", listing.id, name),
                    filename: name.to_string(),
                })
                .await
                .unwrap();
        }
        let repo = SqlxFavoriteRepository::new(pool);
        repo.add(fan.id, listing.id).await.unwrap();

        let favorites = repo.list_by_user(fan.id, 0, 100).await.unwrap();
        assert_eq!(favorites.len(), 1);
        let favorite = &favorites[0];
        assert_eq!(favorite.title, "Bright kitchen");
        assert_eq!(favorite.owner_name.as_deref(), Some("owner"));
        assert_eq!(favorite.listing_status, ListingStatus::Approved);
        assert!(favorite.image_url.as_deref().unwrap().ends_with("first.jpg"));

        assert!(repo.list_by_user(owner.id, 0, 100).await.unwrap().is_empty());
        assert!(repo.list_by_user(fan.id, 1, 100).await.unwrap().is_empty());
    }
}
