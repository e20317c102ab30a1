//! Listing service
//!
//! Public search, owner CRUD and the moderation workflow:
//!
//! ```text
//!   create ──> pending ──review──> approved / rejected
//!                 ^                      │
//!                 └──── owner edit ──────┘
//!   owner delete ──> inactive (terminal for owners and reviewers)
//! ```

use crate::db::repositories::ListingRepository;
use crate::models::{Listing, ListingQuery, ListingStatus, ListingWithOwner, NewListing, User};
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Promotion window applied when an admin features a listing
pub const FEATURE_DAYS: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ListingServiceError {
    #[error("Listing not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    AuthenticationRequired(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// `owner_id` search filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerFilter {
    /// The caller's own listings, every status
    Me,
    /// Another owner's approved listings
    Id(i64),
}

impl OwnerFilter {
    /// `"me"` or a numeric id; anything else is ignored
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("me") {
            return Some(OwnerFilter::Me);
        }
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
            return raw.parse().ok().map(OwnerFilter::Id);
        }
        None
    }
}

/// Public search filters
#[derive(Debug, Clone, Default)]
pub struct ListingFilters {
    pub city: Option<String>,
    pub listing_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub is_featured: Option<bool>,
    pub owner: Option<OwnerFilter>,
}

/// Content fields an owner supplies when creating a listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingInput {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub city: String,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub material: Option<String>,
    pub length_m: Option<f64>,
    pub width_m: Option<f64>,
    pub height_m: Option<f64>,
}

/// Partial content update. Moderation fields are not editable by owners.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub city: Option<String>,
    #[serde(rename = "type")]
    pub listing_type: Option<String>,
    pub material: Option<String>,
    pub length_m: Option<f64>,
    pub width_m: Option<f64>,
    pub height_m: Option<f64>,
}

pub struct ListingService {
    listings: Arc<dyn ListingRepository>,
}

impl ListingService {
    pub fn new(listings: Arc<dyn ListingRepository>) -> Self {
        Self { listings }
    }

    /// Public search. Without `owner=me` only approved listings are returned.
    pub async fn search(
        &self,
        filters: ListingFilters,
        viewer: Option<&User>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Listing>, ListingServiceError> {
        let (status, owner_id) = match filters.owner {
            Some(OwnerFilter::Me) => {
                let viewer = viewer.ok_or_else(|| {
                    ListingServiceError::AuthenticationRequired(
                        "Authentication required to filter by 'me'".to_string(),
                    )
                })?;
                (None, Some(viewer.id))
            }
            Some(OwnerFilter::Id(id)) => (Some(ListingStatus::Approved), Some(id)),
            None => (Some(ListingStatus::Approved), None),
        };

        let query = ListingQuery {
            status,
            owner_id,
            city: filters.city,
            listing_type: filters.listing_type,
            min_price: filters.min_price,
            max_price: filters.max_price,
            is_featured: filters.is_featured,
            offset,
            limit,
        };
        let listings = self
            .listings
            .search(&query)
            .await
            .context("Failed to search listings")?;
        Ok(listings)
    }

    /// A listing as seen by `viewer`: approved listings are public, others
    /// are visible to their owner and to admins only.
    pub async fn get_visible(
        &self,
        id: i64,
        viewer: Option<&User>,
    ) -> Result<Listing, ListingServiceError> {
        let listing = self.get(id).await?;
        let allowed = listing.is_public() || viewer.is_some_and(|u| u.can_manage(listing.owner_id));
        if !allowed {
            return Err(ListingServiceError::NotFound);
        }
        Ok(listing)
    }

    /// Any listing regardless of status
    pub async fn get(&self, id: i64) -> Result<Listing, ListingServiceError> {
        self.listings
            .get_by_id(id)
            .await?
            .ok_or(ListingServiceError::NotFound)
    }

    pub async fn create(
        &self,
        owner: &User,
        input: ListingInput,
    ) -> Result<Listing, ListingServiceError> {
        validate_title(&input.title)?;
        validate_price(input.price)?;
        validate_city(&input.city)?;
        for dim in [input.length_m, input.width_m, input.height_m] {
            validate_dimension(dim)?;
        }

        let listing = self
            .listings
            .create(&NewListing {
                title: input.title.trim().to_string(),
                description: input.description,
                price: input.price,
                city: input.city.trim().to_string(),
                listing_type: input.listing_type,
                material: input.material,
                length_m: input.length_m,
                width_m: input.width_m,
                height_m: input.height_m,
                owner_id: owner.id,
            })
            .await
            .context("Failed to create listing")?;

        tracing::info!(listing_id = listing.id, owner_id = owner.id, "Listing created");
        Ok(listing)
    }

    /// Owner edit. Approved or rejected listings go back to `pending`.
    pub async fn update(
        &self,
        user: &User,
        id: i64,
        patch: ListingPatch,
    ) -> Result<Listing, ListingServiceError> {
        let mut listing = self.get_owned(id, user).await?;

        if listing.status == ListingStatus::Inactive {
            return Err(ListingServiceError::ValidationError(
                "Inactive listings cannot be edited".to_string(),
            ));
        }

        if let Some(title) = patch.title {
            validate_title(&title)?;
            listing.title = title.trim().to_string();
        }
        if let Some(price) = patch.price {
            validate_price(price)?;
            listing.price = price;
        }
        if let Some(city) = patch.city {
            validate_city(&city)?;
            listing.city = city.trim().to_string();
        }
        for (field, value) in [
            (&mut listing.length_m, patch.length_m),
            (&mut listing.width_m, patch.width_m),
            (&mut listing.height_m, patch.height_m),
        ] {
            if value.is_some() {
                validate_dimension(value)?;
                *field = value;
            }
        }
        if patch.description.is_some() {
            listing.description = patch.description;
        }
        if patch.listing_type.is_some() {
            listing.listing_type = patch.listing_type;
        }
        if patch.material.is_some() {
            listing.material = patch.material;
        }

        if listing.status.resubmits_on_edit() {
            tracing::info!(listing_id = id, from = %listing.status, "Listing resubmitted for review");
            listing.status = ListingStatus::Pending;
            listing.rejection_reason = None;
        }

        let updated = self
            .listings
            .update(&listing)
            .await
            .context("Failed to update listing")?;
        Ok(updated)
    }

    /// Soft delete by the owner
    pub async fn deactivate(&self, user: &User, id: i64) -> Result<Listing, ListingServiceError> {
        let mut listing = self.get_owned(id, user).await?;
        listing.status = ListingStatus::Inactive;
        let updated = self
            .listings
            .update(&listing)
            .await
            .context("Failed to deactivate listing")?;
        tracing::info!(listing_id = id, user_id = user.id, "Listing soft-deleted");
        Ok(updated)
    }

    /// Admin review: approve or reject
    pub async fn review(
        &self,
        admin: &User,
        id: i64,
        status: ListingStatus,
        rejection_reason: Option<String>,
    ) -> Result<Listing, ListingServiceError> {
        if !status.is_review_outcome() {
            return Err(ListingServiceError::ValidationError(
                "Review status must be approved or rejected".to_string(),
            ));
        }
        let mut listing = self.get(id).await?;
        if listing.status == ListingStatus::Inactive {
            return Err(ListingServiceError::ValidationError(
                "Inactive listings cannot be reviewed".to_string(),
            ));
        }

        let previous = listing.status;
        listing.status = status;
        listing.rejection_reason = match status {
            ListingStatus::Rejected => rejection_reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            _ => None,
        };
        listing.reviewed_at = Some(Utc::now());

        let updated = self
            .listings
            .update(&listing)
            .await
            .context("Failed to review listing")?;

        tracing::info!(
            listing_id = id,
            admin_id = admin.id,
            from = %previous,
            to = %status,
            reason = updated.rejection_reason.as_deref().unwrap_or(""),
            "Listing reviewed"
        );
        Ok(updated)
    }

    /// Set or flip the featured flag
    pub async fn set_featured(
        &self,
        id: i64,
        featured: Option<bool>,
    ) -> Result<Listing, ListingServiceError> {
        let mut listing = self.get(id).await?;
        let featured = featured.unwrap_or(!listing.is_featured);

        listing.is_featured = featured;
        listing.featured_until = featured.then(|| Utc::now() + Duration::days(FEATURE_DAYS));

        let updated = self
            .listings
            .update(&listing)
            .await
            .context("Failed to update featured flag")?;
        Ok(updated)
    }

    /// Every listing owned by `owner_id`, all statuses
    pub async fn list_owned(
        &self,
        owner_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ListingWithOwner>, ListingServiceError> {
        let rows = self
            .listings
            .search_with_owner(&ListingQuery {
                owner_id: Some(owner_id),
                offset,
                limit,
                ..Default::default()
            })
            .await
            .context("Failed to list owned listings")?;
        Ok(rows)
    }

    /// Admin list with owner names
    pub async fn admin_list(
        &self,
        status: Option<ListingStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ListingWithOwner>, ListingServiceError> {
        let rows = self
            .listings
            .search_with_owner(&ListingQuery {
                status,
                offset,
                limit,
                ..Default::default()
            })
            .await
            .context("Failed to list listings")?;
        Ok(rows)
    }

    pub async fn admin_get(&self, id: i64) -> Result<ListingWithOwner, ListingServiceError> {
        self.listings
            .get_with_owner(id)
            .await?
            .ok_or(ListingServiceError::NotFound)
    }

    pub async fn owned_ids(&self, owner_id: i64) -> Result<Vec<i64>, ListingServiceError> {
        Ok(self.listings.ids_by_owner(owner_id).await?)
    }

    /// Listing owned by `user`; admins are not owners here
    pub async fn get_owned(&self, id: i64, user: &User) -> Result<Listing, ListingServiceError> {
        let listing = self.get(id).await?;
        if listing.owner_id != user.id {
            tracing::warn!(user_id = user.id, listing_id = id, "Unauthorized listing modification attempt");
            return Err(ListingServiceError::Forbidden(
                "Not authorized to modify this listing".to_string(),
            ));
        }
        Ok(listing)
    }
}

fn validate_title(title: &str) -> Result<(), ListingServiceError> {
    let len = title.trim().chars().count();
    if !(3..=200).contains(&len) {
        return Err(ListingServiceError::ValidationError(
            "Title must be between 3 and 200 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), ListingServiceError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ListingServiceError::ValidationError(
            "Price must be zero or positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_city(city: &str) -> Result<(), ListingServiceError> {
    if city.trim().is_empty() {
        return Err(ListingServiceError::ValidationError(
            "City is required".to_string(),
        ));
    }
    Ok(())
}

fn validate_dimension(value: Option<f64>) -> Result<(), ListingServiceError> {
    match value {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(ListingServiceError::ValidationError(
            "Dimensions must be positive".to_string(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::{insert_user, migrated_pool};
    use crate::db::repositories::SqlxListingRepository;
    use crate::models::UserRole;

    async fn setup() -> (ListingService, User, User, User) {
        let pool = migrated_pool().await;
        let owner = insert_user(&pool, "owner", UserRole::Advertiser).await;
        let other = insert_user(&pool, "other", UserRole::Client).await;
        let admin = insert_user(&pool, "admin", UserRole::Admin).await;
        (ListingService::new(SqlxListingRepository::boxed(pool)), owner, other, admin)
    }

    fn input(title: &str) -> ListingInput {
        ListingInput {
            title: title.to_string(),
            price: 5000.0,
            city: " Riyadh ".to_string(),
            listing_type: Some("new".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_owner_filter_parse() {
        assert_eq!(OwnerFilter::parse("me"), Some(OwnerFilter::Me));
        assert_eq!(OwnerFilter::parse("ME"), Some(OwnerFilter::Me));
        assert_eq!(OwnerFilter::parse("42"), Some(OwnerFilter::Id(42)));
        assert_eq!(OwnerFilter::parse("-1"), None);
        assert_eq!(OwnerFilter::parse("abc"), None);
        assert_eq!(OwnerFilter::parse(""), None);
    }

    #[tokio::test]
    async fn test_create_validates_and_starts_pending() {
        let (service, owner, _, _) = setup().await;

        let listing = service.create(&owner, input("Modern kitchen")).await.unwrap();
        assert_eq!(listing.status, ListingStatus::Pending);
        assert_eq!(listing.city, "Riyadh");

        let mut bad = input("ab");
        assert!(matches!(
            service.create(&owner, bad.clone()).await,
            Err(ListingServiceError::ValidationError(_))
        ));
        bad = input("Valid title");
        bad.price = -1.0;
        assert!(service.create(&owner, bad).await.is_err());
        let mut bad = input("Valid title");
        bad.width_m = Some(0.0);
        assert!(service.create(&owner, bad).await.is_err());
        let mut bad = input("Valid title");
        bad.city = "  ".to_string();
        assert!(service.create(&owner, bad).await.is_err());
    }

    #[tokio::test]
    async fn test_visibility_follows_moderation() {
        let (service, owner, other, admin) = setup().await;
        let listing = service.create(&owner, input("Pending kitchen")).await.unwrap();

        assert!(matches!(
            service.get_visible(listing.id, None).await,
            Err(ListingServiceError::NotFound)
        ));
        assert!(service.get_visible(listing.id, Some(&other)).await.is_err());
        assert!(service.get_visible(listing.id, Some(&owner)).await.is_ok());
        assert!(service.get_visible(listing.id, Some(&admin)).await.is_ok());

        let public = service
            .search(ListingFilters::default(), None, 0, 100)
            .await
            .unwrap();
        assert!(public.is_empty());

        service
            .review(&admin, listing.id, ListingStatus::Approved, None)
            .await
            .unwrap();
        assert!(service.get_visible(listing.id, None).await.is_ok());
        let public = service
            .search(ListingFilters::default(), None, 0, 100)
            .await
            .unwrap();
        assert_eq!(public.len(), 1);
    }

    #[tokio::test]
    async fn test_owner_me_filter() {
        let (service, owner, _, _) = setup().await;
        service.create(&owner, input("Mine pending")).await.unwrap();

        let filters = ListingFilters {
            owner: Some(OwnerFilter::Me),
            ..Default::default()
        };
        assert!(matches!(
            service.search(filters.clone(), None, 0, 100).await,
            Err(ListingServiceError::AuthenticationRequired(_))
        ));
        let mine = service.search(filters, Some(&owner), 0, 100).await.unwrap();
        assert_eq!(mine.len(), 1);

        let by_id = ListingFilters {
            owner: Some(OwnerFilter::Id(owner.id)),
            ..Default::default()
        };
        assert!(service.search(by_id, None, 0, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_resubmits_reviewed_listing() {
        let (service, owner, other, admin) = setup().await;
        let listing = service.create(&owner, input("Kitchen")).await.unwrap();
        service
            .review(&admin, listing.id, ListingStatus::Rejected, Some("Blurry photos".into()))
            .await
            .unwrap();

        let patch = ListingPatch {
            price: Some(4500.0),
            ..Default::default()
        };
        assert!(matches!(
            service.update(&other, listing.id, patch.clone()).await,
            Err(ListingServiceError::Forbidden(_))
        ));

        let updated = service.update(&owner, listing.id, patch).await.unwrap();
        assert_eq!(updated.status, ListingStatus::Pending);
        assert_eq!(updated.rejection_reason, None);
        assert_eq!(updated.price, 4500.0);
        assert!(updated.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn test_deactivate_is_terminal() {
        let (service, owner, _, admin) = setup().await;
        let listing = service.create(&owner, input("Kitchen")).await.unwrap();

        let inactive = service.deactivate(&owner, listing.id).await.unwrap();
        assert_eq!(inactive.status, ListingStatus::Inactive);

        assert!(matches!(
            service.update(&owner, listing.id, ListingPatch::default()).await,
            Err(ListingServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.review(&admin, listing.id, ListingStatus::Approved, None).await,
            Err(ListingServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_review_rules() {
        let (service, owner, _, admin) = setup().await;
        let listing = service.create(&owner, input("Kitchen")).await.unwrap();

        assert!(matches!(
            service.review(&admin, listing.id, ListingStatus::Pending, None).await,
            Err(ListingServiceError::ValidationError(_))
        ));

        let rejected = service
            .review(&admin, listing.id, ListingStatus::Rejected, Some("  Missing price ".into()))
            .await
            .unwrap();
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Missing price"));

        let approved = service
            .review(&admin, listing.id, ListingStatus::Approved, Some("ignored".into()))
            .await
            .unwrap();
        assert_eq!(approved.rejection_reason, None);
        assert!(matches!(
            service.review(&admin, 9999, ListingStatus::Approved, None).await,
            Err(ListingServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_featured_toggle() {
        let (service, owner, _, _) = setup().await;
        let listing = service.create(&owner, input("Kitchen")).await.unwrap();

        let featured = service.set_featured(listing.id, None).await.unwrap();
        assert!(featured.is_featured);
        let until = featured.featured_until.unwrap();
        assert!(until > Utc::now() + Duration::days(FEATURE_DAYS - 1));

        let unfeatured = service.set_featured(listing.id, None).await.unwrap();
        assert!(!unfeatured.is_featured);
        assert!(unfeatured.featured_until.is_none());

        let forced = service.set_featured(listing.id, Some(false)).await.unwrap();
        assert!(!forced.is_featured);
    }

    #[tokio::test]
    async fn test_owned_and_admin_lists() {
        let (service, owner, _, admin) = setup().await;
        let a = service.create(&owner, input("First")).await.unwrap();
        let b = service.create(&owner, input("Second")).await.unwrap();
        service.review(&admin, a.id, ListingStatus::Approved, None).await.unwrap();

        let owned = service.list_owned(owner.id, 0, 100).await.unwrap();
        assert_eq!(owned.len(), 2);
        assert_eq!(owned[0].listing.id, b.id);

        let pending = service
            .admin_list(Some(ListingStatus::Pending), 0, 100)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].owner_name.as_deref(), Some("owner"));

        assert_eq!(service.admin_get(a.id).await.unwrap().listing.id, a.id);
        assert_eq!(service.owned_ids(owner.id).await.unwrap().len(), 2);
    }
}
