//! Favorite model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ListingStatus;

/// A (user, listing) bookmark; the pair is unique
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Favorite {
    pub id: i64,
    pub user_id: i64,
    pub listing_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Favorite joined with a summary of the listing it points to
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FavoriteWithListing {
    pub id: i64,
    pub listing_id: i64,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub city: String,
    #[sqlx(try_from = "String")]
    pub listing_status: ListingStatus,
    pub listing_type: Option<String>,
    pub is_featured: bool,
    pub listing_created_at: DateTime<Utc>,
    pub owner_name: Option<String>,
    /// URL of the first uploaded image, if any
    pub image_url: Option<String>,
}
