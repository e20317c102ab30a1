//! Listing image storage
//!
//! Files live under `<upload root>/listings/{listing_id}/{uuid}.{ext}` and are
//! served from `/media/listings/{listing_id}/{file}`. A batch is validated in
//! full before the first byte is written.

use crate::config::UploadConfig;
use crate::db::repositories::ListingImageRepository;
use crate::models::{ListingImage, NewListingImage};
use anyhow::Context;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ImageServiceError {
    #[error("Image not found")]
    NotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    TooLarge(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// One uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

pub struct ImageService {
    images: Arc<dyn ListingImageRepository>,
    config: Arc<UploadConfig>,
}

impl ImageService {
    pub fn new(images: Arc<dyn ListingImageRepository>, config: Arc<UploadConfig>) -> Self {
        Self { images, config }
    }

    fn listing_dir(&self, listing_id: i64) -> PathBuf {
        self.config.path.join("listings").join(listing_id.to_string())
    }

    /// Check type and size of every file in the batch
    pub fn validate(&self, uploads: &[ImageUpload]) -> Result<(), ImageServiceError> {
        if uploads.is_empty() {
            return Err(ImageServiceError::ValidationError(
                "No files provided".to_string(),
            ));
        }
        for upload in uploads {
            if !self.config.is_type_allowed(&upload.content_type) {
                return Err(ImageServiceError::ValidationError(format!(
                    "File {} is not an image",
                    upload.file_name
                )));
            }
            if upload.data.len() as u64 > self.config.max_file_size {
                return Err(ImageServiceError::TooLarge(format!(
                    "File {} is too large. Maximum size: {} MB",
                    upload.file_name,
                    self.config.max_file_size / 1024 / 1024
                )));
            }
        }
        Ok(())
    }

    /// Validate, write and record a batch of images for a listing
    pub async fn store(
        &self,
        listing_id: i64,
        uploads: Vec<ImageUpload>,
    ) -> Result<Vec<ListingImage>, ImageServiceError> {
        self.validate(&uploads)?;

        let dir = self.listing_dir(listing_id);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create media directory {}", dir.display()))?;

        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let filename = format!(
                "{}.{}",
                Uuid::new_v4(),
                self.config.extension_for(&upload.content_type)
            );
            let path = dir.join(&filename);
            fs::write(&path, &upload.data)
                .await
                .with_context(|| format!("Failed to save {}", path.display()))?;

            let image = self
                .images
                .create(&NewListingImage {
                    listing_id,
                    url: format!("/media/listings/{}/{}", listing_id, filename),
                    filename,
                })
                .await
                .context("Failed to record image")?;
            stored.push(image);
        }

        tracing::info!(listing_id, count = stored.len(), "Listing images uploaded");
        Ok(stored)
    }

    pub async fn list(&self, listing_id: i64) -> Result<Vec<ListingImage>, ImageServiceError> {
        Ok(self.images.list_by_listing(listing_id).await?)
    }

    /// Delete an image row and its file; a file already gone is fine
    pub async fn delete(&self, listing_id: i64, image_id: i64) -> Result<(), ImageServiceError> {
        let image = self
            .images
            .get_by_id(image_id)
            .await?
            .filter(|image| image.listing_id == listing_id)
            .ok_or(ImageServiceError::NotFound)?;

        let path = self.listing_dir(listing_id).join(&image.filename);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to remove {}", path.display()))
                    .into())
            }
        }

        self.images
            .delete(image.id)
            .await
            .context("Failed to delete image")?;
        Ok(())
    }

    /// Remove a listing's whole media directory
    pub async fn remove_listing_dir(&self, listing_id: i64) -> Result<(), ImageServiceError> {
        let dir = self.listing_dir(listing_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to remove {}", dir.display()))
                .into()),
        }
    }
}
