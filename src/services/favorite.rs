//! Favorite service

use crate::db::repositories::{FavoriteRepository, ListingRepository};
use crate::models::{Favorite, FavoriteWithListing};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum FavoriteServiceError {
    #[error("Listing not found")]
    ListingNotFound,

    #[error("Already in favorites")]
    AlreadyFavorite,

    #[error("Not in favorites")]
    NotFavorite,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct FavoriteService {
    favorites: Arc<dyn FavoriteRepository>,
    listings: Arc<dyn ListingRepository>,
}

impl FavoriteService {
    pub fn new(
        favorites: Arc<dyn FavoriteRepository>,
        listings: Arc<dyn ListingRepository>,
    ) -> Self {
        Self {
            favorites,
            listings,
        }
    }

    pub async fn list(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FavoriteWithListing>, FavoriteServiceError> {
        let favorites = self
            .favorites
            .list_by_user(user_id, offset, limit)
            .await
            .context("Failed to list favorites")?;
        Ok(favorites)
    }

    pub async fn add(&self, user_id: i64, listing_id: i64) -> Result<Favorite, FavoriteServiceError> {
        if self.listings.get_by_id(listing_id).await?.is_none() {
            return Err(FavoriteServiceError::ListingNotFound);
        }
        if self.favorites.get(user_id, listing_id).await?.is_some() {
            return Err(FavoriteServiceError::AlreadyFavorite);
        }
        Ok(self.favorites.add(user_id, listing_id).await?)
    }

    pub async fn remove(&self, user_id: i64, listing_id: i64) -> Result<(), FavoriteServiceError> {
        let favorite = self
            .favorites
            .get(user_id, listing_id)
            .await?
            .ok_or(FavoriteServiceError::NotFavorite)?;
        self.favorites.remove(favorite.id).await?;
        Ok(())
    }

    pub async fn is_favorite(&self, user_id: i64, listing_id: i64) -> Result<bool, FavoriteServiceError> {
        Ok(self.favorites.get(user_id, listing_id).await?.is_some())
    }
}
