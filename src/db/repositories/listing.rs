//! Listing repository
//!
//! Database operations for listings and their images.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{
    Listing, ListingImage, ListingQuery, ListingStatus, ListingWithOwner, NewListing,
    NewListingImage,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Filter clause shared by the search queries. Every optional filter is bound
/// twice: once for the NULL test, once for the comparison.
const SEARCH_FILTERS: &str = r#"
    WHERE (? IS NULL OR l.status = ?)
      AND (? IS NULL OR l.owner_id = ?)
      AND (? IS NULL OR LOWER(l.city) LIKE ?)
      AND (? IS NULL OR LOWER(l.listing_type) LIKE ?)
      AND (? IS NULL OR l.price >= ?)
      AND (? IS NULL OR l.price <= ?)
      AND (? IS NULL OR l.is_featured = ?)
    ORDER BY l.is_featured DESC, l.created_at DESC, l.id DESC
    LIMIT ? OFFSET ?
"#;

/// Listing repository trait
#[async_trait]
pub trait ListingRepository: Send + Sync {
    /// Insert a listing in the `pending` state
    async fn create(&self, listing: &NewListing) -> Result<Listing>;

    /// Get listing by ID, whatever its status
    async fn get_by_id(&self, id: i64) -> Result<Option<Listing>>;

    /// Filtered search, featured first then newest first
    async fn search(&self, query: &ListingQuery) -> Result<Vec<Listing>>;

    /// Same filters as `search`, joined with owner name and image count
    async fn search_with_owner(&self, query: &ListingQuery) -> Result<Vec<ListingWithOwner>>;

    /// Single listing joined with owner name and image count
    async fn get_with_owner(&self, id: i64) -> Result<Option<ListingWithOwner>>;

    /// Persist every mutable column of `listing`
    async fn update(&self, listing: &Listing) -> Result<Listing>;

    /// Count listings, optionally restricted to one status
    async fn count_by_status(&self, status: Option<ListingStatus>) -> Result<i64>;

    /// IDs of every listing owned by `owner_id`
    async fn ids_by_owner(&self, owner_id: i64) -> Result<Vec<i64>>;

    /// Clear the featured flag where `featured_until` has passed
    async fn expire_features(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Listing image repository trait
#[async_trait]
pub trait ListingImageRepository: Send + Sync {
    async fn create(&self, image: &NewListingImage) -> Result<ListingImage>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ListingImage>>;

    /// Images of a listing in upload order
    async fn list_by_listing(&self, listing_id: i64) -> Result<Vec<ListingImage>>;

    async fn delete(&self, id: i64) -> Result<()>;
}

/// SQLx-based listing repository implementation
pub struct SqlxListingRepository {
    pool: DynDatabasePool,
}

impl SqlxListingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ListingRepository> {
        Arc::new(Self::new(pool))
    }
}

fn like_pattern(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| format!("%{}%", v.to_lowercase()))
}

#[async_trait]
impl ListingRepository for SqlxListingRepository {
    async fn create(&self, listing: &NewListing) -> Result<Listing> {
        let now = Utc::now();
        let sql = r#"
            INSERT INTO listings (title, description, price, city, listing_type, material,
                                  length_m, width_m, height_m, status, is_featured, owner_id,
                                  created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, FALSE, ?, ?, ?)
        "#;

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&listing.title)
                .bind(&listing.description)
                .bind(listing.price)
                .bind(&listing.city)
                .bind(&listing.listing_type)
                .bind(&listing.material)
                .bind(listing.length_m)
                .bind(listing.width_m)
                .bind(listing.height_m)
                .bind(ListingStatus::Pending.as_str())
                .bind(listing.owner_id)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&listing.title)
                .bind(&listing.description)
                .bind(listing.price)
                .bind(&listing.city)
                .bind(&listing.listing_type)
                .bind(&listing.material)
                .bind(listing.length_m)
                .bind(listing.width_m)
                .bind(listing.height_m)
                .bind(ListingStatus::Pending.as_str())
                .bind(listing.owner_id)
                .bind(now)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create listing")?;

        self.get_by_id(id)
            .await?
            .context("Listing disappeared after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Listing>> {
        let listing = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = ?")
                .bind(id)
                .fetch_optional(p)
                .await
        })
        .context("Failed to get listing by ID")?;
        Ok(listing)
    }

    async fn search(&self, query: &ListingQuery) -> Result<Vec<Listing>> {
        let sql = format!("SELECT l.* FROM listings l {}", SEARCH_FILTERS);
        let status = query.status.map(|s| s.as_str());
        let city = like_pattern(&query.city);
        let listing_type = like_pattern(&query.listing_type);

        let listings = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, Listing>(&sql)
                .bind(status)
                .bind(status)
                .bind(query.owner_id)
                .bind(query.owner_id)
                .bind(&city)
                .bind(&city)
                .bind(&listing_type)
                .bind(&listing_type)
                .bind(query.min_price)
                .bind(query.min_price)
                .bind(query.max_price)
                .bind(query.max_price)
                .bind(query.is_featured)
                .bind(query.is_featured)
                .bind(query.limit)
                .bind(query.offset)
                .fetch_all(p)
                .await
        })
        .context("Failed to search listings")?;
        Ok(listings)
    }

    async fn search_with_owner(&self, query: &ListingQuery) -> Result<Vec<ListingWithOwner>> {
        let sql = format!(
            r#"
            SELECT l.*,
                   COALESCE(u.full_name, u.username) AS owner_name,
                   (SELECT COUNT(*) FROM listing_images i WHERE i.listing_id = l.id) AS images_count
            FROM listings l
            LEFT JOIN users u ON u.id = l.owner_id
            {}
            "#,
            SEARCH_FILTERS
        );
        let status = query.status.map(|s| s.as_str());
        let city = like_pattern(&query.city);
        let listing_type = like_pattern(&query.listing_type);

        let listings = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, ListingWithOwner>(&sql)
                .bind(status)
                .bind(status)
                .bind(query.owner_id)
                .bind(query.owner_id)
                .bind(&city)
                .bind(&city)
                .bind(&listing_type)
                .bind(&listing_type)
                .bind(query.min_price)
                .bind(query.min_price)
                .bind(query.max_price)
                .bind(query.max_price)
                .bind(query.is_featured)
                .bind(query.is_featured)
                .bind(query.limit)
                .bind(query.offset)
                .fetch_all(p)
                .await
        })
        .context("Failed to search listings with owner")?;
        Ok(listings)
    }

    async fn get_with_owner(&self, id: i64) -> Result<Option<ListingWithOwner>> {
        let listing = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, ListingWithOwner>(
                r#"
                SELECT l.*,
                       COALESCE(u.full_name, u.username) AS owner_name,
                       (SELECT COUNT(*) FROM listing_images i WHERE i.listing_id = l.id) AS images_count
                FROM listings l
                LEFT JOIN users u ON u.id = l.owner_id
                WHERE l.id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(p)
            .await
        })
        .context("Failed to get listing with owner")?;
        Ok(listing)
    }

    async fn update(&self, listing: &Listing) -> Result<Listing> {
        let now = Utc::now();
        with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE listings SET
                    title = ?, description = ?, price = ?, city = ?, listing_type = ?,
                    material = ?, length_m = ?, width_m = ?, height_m = ?, status = ?,
                    is_featured = ?, featured_until = ?, rejection_reason = ?,
                    reviewed_at = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&listing.title)
            .bind(&listing.description)
            .bind(listing.price)
            .bind(&listing.city)
            .bind(&listing.listing_type)
            .bind(&listing.material)
            .bind(listing.length_m)
            .bind(listing.width_m)
            .bind(listing.height_m)
            .bind(listing.status.as_str())
            .bind(listing.is_featured)
            .bind(listing.featured_until)
            .bind(&listing.rejection_reason)
            .bind(listing.reviewed_at)
            .bind(now)
            .bind(listing.id)
            .execute(p)
            .await
            .map(|_| ())
        })
        .context("Failed to update listing")?;

        Ok(Listing {
            updated_at: now,
            ..listing.clone()
        })
    }

    async fn count_by_status(&self, status: Option<ListingStatus>) -> Result<i64> {
        let status = status.map(|s| s.as_str());
        let count = with_pool!(self.pool, |p| {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM listings WHERE (? IS NULL OR status = ?)",
            )
            .bind(status)
            .bind(status)
            .fetch_one(p)
            .await
        })
        .context("Failed to count listings")?;
        Ok(count)
    }

    async fn ids_by_owner(&self, owner_id: i64) -> Result<Vec<i64>> {
        let ids = with_pool!(self.pool, |p| {
            sqlx::query_scalar::<_, i64>("SELECT id FROM listings WHERE owner_id = ?")
                .bind(owner_id)
                .fetch_all(p)
                .await
        })
        .context("Failed to list listing IDs by owner")?;
        Ok(ids)
    }

    async fn expire_features(&self, now: DateTime<Utc>) -> Result<u64> {
        let affected = with_pool!(self.pool, |p| {
            sqlx::query(
                r#"
                UPDATE listings SET is_featured = FALSE, featured_until = NULL, updated_at = ?
                WHERE is_featured = TRUE AND featured_until IS NOT NULL AND featured_until < ?
                "#,
            )
            .bind(now)
            .bind(now)
            .execute(p)
            .await
            .map(|r| r.rows_affected())
        })
        .context("Failed to expire featured listings")?;
        Ok(affected)
    }
}

/// SQLx-based listing image repository implementation
pub struct SqlxListingImageRepository {
    pool: DynDatabasePool,
}

impl SqlxListingImageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ListingImageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ListingImageRepository for SqlxListingImageRepository {
    async fn create(&self, image: &NewListingImage) -> Result<ListingImage> {
        let now = Utc::now();
        let sql = "INSERT INTO listing_images (listing_id, url, filename, created_at) VALUES (?, ?, ?, ?)";

        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(image.listing_id)
                .bind(&image.url)
                .bind(&image.filename)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .map(|r| r.last_insert_rowid()),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(image.listing_id)
                .bind(&image.url)
                .bind(&image.filename)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .map(|r| r.last_insert_id() as i64),
        }
        .context("Failed to create listing image")?;

        Ok(ListingImage {
            id,
            listing_id: image.listing_id,
            url: image.url.clone(),
            filename: image.filename.clone(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ListingImage>> {
        let image = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, ListingImage>("SELECT * FROM listing_images WHERE id = ?")
                .bind(id)
                .fetch_optional(p)
                .await
        })
        .context("Failed to get listing image")?;
        Ok(image)
    }

    async fn list_by_listing(&self, listing_id: i64) -> Result<Vec<ListingImage>> {
        let images = with_pool!(self.pool, |p| {
            sqlx::query_as::<_, ListingImage>(
                "SELECT * FROM listing_images WHERE listing_id = ? ORDER BY id",
            )
            .bind(listing_id)
            .fetch_all(p)
            .await
        })
        .context("Failed to list listing images")?;
        Ok(images)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        with_pool!(self.pool, |p| {
            sqlx::query("DELETE FROM listing_images WHERE id = ?")
                .bind(id)
                .execute(p)
                .await
                .map(|_| ())
        })
        .context("Failed to delete listing image")?;
        Ok(())
    }
}
