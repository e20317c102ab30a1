//! Settings service
//!
//! Site-wide key-value settings. Public keys (branding, contact details,
//! legal texts) are readable without authentication.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::db::repositories::SiteSettingRepository;
use crate::models::SiteSetting;

/// `(key, value, description)` of the settings created by `init_defaults`;
/// every default is public
pub const DEFAULT_SETTINGS: &[(&str, &str, &str)] = &[
    ("site_name", "كيتشن تك", "اسم الموقع"),
    ("site_logo_url", "", "رابط شعار الموقع"),
    ("primary_color", "#2196F3", "اللون الأساسي"),
    ("secondary_color", "#FF9800", "اللون الثانوي"),
    ("support_email", "support@kitchentech.sa", "بريد الدعم"),
    ("support_phone", "+966501234567", "رقم الدعم"),
    ("whatsapp_number", "+966501234567", "رقم واتساب"),
    ("facebook_url", "https://facebook.com/kitchentech.sa", "رابط فيسبوك"),
    ("twitter_url", "https://twitter.com/kitchentech_sa", "رابط تويتر"),
    ("instagram_url", "https://instagram.com/kitchentech.sa", "رابط إنستغرام"),
    ("tiktok_url", "https://tiktok.com/@kitchentech.sa", "رابط تيك توك"),
    ("terms_of_service", "نص الشروط والأحكام...", "الشروط والأحكام"),
    ("privacy_policy", "نص سياسة الخصوصية...", "سياسة الخصوصية"),
];

const MAX_KEY_LENGTH: usize = 100;

/// Settings service errors
#[derive(Debug, Error)]
pub enum SettingsServiceError {
    #[error("Setting not found")]
    NotFound,

    #[error("This setting is not public")]
    NotPublic,

    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Setting as exposed over the API
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SettingView {
    pub key: String,
    pub value: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
}

impl From<SiteSetting> for SettingView {
    fn from(setting: SiteSetting) -> Self {
        Self {
            key: setting.key,
            value: setting.value,
            description: setting.description,
            is_public: setting.is_public,
        }
    }
}

/// Admin upsert body
#[derive(Debug, Clone, Deserialize)]
pub struct SettingUpdate {
    pub value: String,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

pub struct SettingsService {
    repo: Arc<dyn SiteSettingRepository>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SiteSettingRepository>) -> Self {
        Self { repo }
    }

    /// Public settings ordered by key
    pub async fn list_public(&self) -> Result<Vec<SettingView>, SettingsServiceError> {
        let settings = self
            .repo
            .list(true)
            .await
            .context("Failed to load public settings")?;
        Ok(settings.into_iter().map(SettingView::from).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<SettingView>, SettingsServiceError> {
        let settings = self
            .repo
            .list(false)
            .await
            .context("Failed to load settings")?;
        Ok(settings.into_iter().map(SettingView::from).collect())
    }

    /// A single public setting; private keys are refused
    pub async fn get_public(&self, key: &str) -> Result<SettingView, SettingsServiceError> {
        let setting = self
            .repo
            .get(key)
            .await?
            .ok_or(SettingsServiceError::NotFound)?;
        if !setting.is_public {
            return Err(SettingsServiceError::NotPublic);
        }
        Ok(setting.into())
    }

    pub async fn upsert(
        &self,
        key: &str,
        update: SettingUpdate,
    ) -> Result<SettingView, SettingsServiceError> {
        let key = key.trim();
        if key.is_empty() || key.len() > MAX_KEY_LENGTH {
            return Err(SettingsServiceError::ValidationError(format!(
                "Setting key must be 1 to {} characters",
                MAX_KEY_LENGTH
            )));
        }
        let setting = self
            .repo
            .upsert(
                key,
                &update.value,
                update.description.as_deref(),
                update.is_public,
            )
            .await
            .with_context(|| format!("Failed to save setting {}", key))?;
        tracing::info!(key, "Setting updated");
        Ok(setting.into())
    }

    /// Insert the defaults that are missing; returns how many were created
    pub async fn init_defaults(&self) -> Result<usize, SettingsServiceError> {
        let mut created = 0;
        for (key, value, description) in DEFAULT_SETTINGS {
            if self
                .repo
                .insert_if_absent(key, value, description, true)
                .await
                .with_context(|| format!("Failed to initialize setting {}", key))?
            {
                created += 1;
            }
        }
        if created > 0 {
            tracing::info!(created, "Default settings initialized");
        }
        Ok(created)
    }
}
