//! Listing model
//!
//! This module provides:
//! - `Listing` entity, a kitchen offered for rent or sale
//! - `ListingStatus`, the moderation state machine
//! - `ListingImage` rows attached to a listing
//! - `ListingQuery` filters used by the public search and admin lists

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// Moderation status.
    ///
    /// New and edited listings wait in `Pending` until an admin approves or
    /// rejects them. `Inactive` is the soft-deleted state.
    pub enum ListingStatus ("listing status") {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Inactive => "inactive",
    }
}

impl Default for ListingStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ListingStatus {
    /// Statuses an admin review may set
    pub fn is_review_outcome(&self) -> bool {
        matches!(self, ListingStatus::Approved | ListingStatus::Rejected)
    }

    /// Whether an owner edit sends the listing back to the review queue
    pub fn resubmits_on_edit(&self) -> bool {
        matches!(self, ListingStatus::Approved | ListingStatus::Rejected)
    }
}

/// Listing entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub city: String,
    /// Free-form kitchen type (new, used, commercial, ...)
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub material: Option<String>,
    pub length_m: Option<f64>,
    pub width_m: Option<f64>,
    pub height_m: Option<f64>,
    #[sqlx(try_from = "String")]
    pub status: ListingStatus,
    pub is_featured: bool,
    /// End of the paid promotion window
    pub featured_until: Option<DateTime<Utc>>,
    pub owner_id: i64,
    pub rejection_reason: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Visible to anonymous visitors
    pub fn is_public(&self) -> bool {
        self.status == ListingStatus::Approved
    }
}

/// Input for inserting a listing
#[derive(Debug, Clone, Default)]
pub struct NewListing {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub city: String,
    pub listing_type: Option<String>,
    pub material: Option<String>,
    pub length_m: Option<f64>,
    pub width_m: Option<f64>,
    pub height_m: Option<f64>,
    pub owner_id: i64,
}

/// A listing joined with its owner's name (admin views)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ListingWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub listing: Listing,
    pub owner_name: Option<String>,
    pub images_count: i64,
}

/// Search filters. `None` means "no constraint".
///
/// `city` and `listing_type` are case-insensitive substring matches.
#[derive(Debug, Clone)]
pub struct ListingQuery {
    pub status: Option<ListingStatus>,
    pub owner_id: Option<i64>,
    pub city: Option<String>,
    pub listing_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub is_featured: Option<bool>,
    pub offset: i64,
    pub limit: i64,
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            status: None,
            owner_id: None,
            city: None,
            listing_type: None,
            min_price: None,
            max_price: None,
            is_featured: None,
            offset: 0,
            limit: 100,
        }
    }
}

/// Image attached to a listing
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ListingImage {
    pub id: i64,
    pub listing_id: i64,
    /// Public URL under `/media`
    pub url: String,
    /// Stored file name inside the listing's media directory
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewListingImage {
    pub listing_id: i64,
    pub url: String,
    pub filename: String,
}
