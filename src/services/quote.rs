//! Quote request (lead) service
//!
//! Anonymous visitors leave a style, a city and a Saudi mobile number. The
//! same number may submit at most once per 24 hours.

use crate::db::repositories::QuoteRepository;
use crate::models::{NewQuoteRequest, QuoteRequest, QuoteStatus, QuoteStyle};
use crate::services::validation::{non_blank, normalize_phone};
pub use crate::services::validation::INVALID_PHONE_MESSAGE;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// City keys the sales team works with; anything else is `other`
pub const KNOWN_CITIES: &[&str] = &["riyadh", "jeddah", "dammam", "khobar", "other"];

const DUPLICATE_WINDOW_HOURS: i64 = 24;

pub const DUPLICATE_MESSAGE: &str = "A quote request with this phone number already exists within the last 24 hours. Please try again later or contact us directly.";

#[derive(Debug, thiserror::Error)]
pub enum QuoteServiceError {
    #[error("Quote request with id {0} not found")]
    NotFound(i64),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteInput {
    pub style: QuoteStyle,
    pub city: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuoteStats {
    pub total: i64,
    pub by_style: BTreeMap<String, i64>,
    pub by_city: BTreeMap<String, i64>,
    pub by_status: BTreeMap<String, i64>,
}

/// Trim and lowercase; unknown cities collapse to `other`.
///
/// Length is checked on the raw (trimmed) input before mapping.
pub fn normalize_city(raw: &str) -> Result<String, QuoteServiceError> {
    let city = raw.trim().to_lowercase();
    let len = city.chars().count();
    if !(2..=100).contains(&len) {
        return Err(QuoteServiceError::ValidationError(
            "City must be between 2 and 100 characters".to_string(),
        ));
    }
    if KNOWN_CITIES.contains(&city.as_str()) {
        Ok(city)
    } else {
        Ok("other".to_string())
    }
}

pub struct QuoteService {
    quotes: Arc<dyn QuoteRepository>,
}

impl QuoteService {
    pub fn new(quotes: Arc<dyn QuoteRepository>) -> Self {
        Self { quotes }
    }

    pub async fn create(&self, input: QuoteInput) -> Result<QuoteRequest, QuoteServiceError> {
        let phone = normalize_phone(&input.phone)
            .ok_or_else(|| QuoteServiceError::ValidationError(INVALID_PHONE_MESSAGE.to_string()))?;
        let city = normalize_city(&input.city)?;

        let since = Utc::now() - Duration::hours(DUPLICATE_WINDOW_HOURS);
        if self.quotes.exists_recent_phone(&phone, since).await? {
            tracing::info!(city = %city, "Duplicate quote request rejected");
            return Err(QuoteServiceError::Conflict(DUPLICATE_MESSAGE.to_string()));
        }

        let quote = self
            .quotes
            .create(&NewQuoteRequest {
                style: input.style,
                city,
                phone,
            })
            .await
            .context("Failed to save quote request")?;

        tracing::info!(id = quote.id, style = %quote.style, city = %quote.city, "Quote request received");
        Ok(quote)
    }

    /// Newest first; the city filter is compared lowercased
    pub async fn list(
        &self,
        status: Option<QuoteStatus>,
        city: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<QuoteRequest>, QuoteServiceError> {
        let city = city.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty());
        Ok(self
            .quotes
            .list(status, city.as_deref(), offset, limit)
            .await?)
    }

    pub async fn get(&self, id: i64) -> Result<QuoteRequest, QuoteServiceError> {
        self.quotes
            .get_by_id(id)
            .await?
            .ok_or(QuoteServiceError::NotFound(id))
    }

    pub async fn stats(&self) -> Result<QuoteStats, QuoteServiceError> {
        let grouped = |rows: Vec<(String, i64)>| rows.into_iter().collect::<BTreeMap<_, _>>();
        Ok(QuoteStats {
            total: self.quotes.count().await?,
            by_style: grouped(self.quotes.count_grouped("style").await?),
            by_city: grouped(self.quotes.count_grouped("city").await?),
            by_status: grouped(self.quotes.count_grouped("status").await?),
        })
    }

    pub async fn update_status(
        &self,
        id: i64,
        status: QuoteStatus,
        admin_notes: Option<String>,
    ) -> Result<QuoteRequest, QuoteServiceError> {
        self.get(id).await?;
        let notes = non_blank(admin_notes);
        self.quotes
            .update_status(id, status, notes.as_deref())
            .await
            .context("Failed to update quote request")?;
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), QuoteServiceError> {
        self.get(id).await?;
        self.quotes
            .delete(id)
            .await
            .context("Failed to delete quote request")?;
        tracing::info!(id, "Quote request deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::fixtures::migrated_pool;
    use crate::db::repositories::SqlxQuoteRepository;
    use proptest::prelude::*;

    fn input(style: QuoteStyle, city: &str, phone: &str) -> QuoteInput {
        QuoteInput {
            style,
            city: city.to_string(),
            phone: phone.to_string(),
        }
    }

    async fn service() -> QuoteService {
        QuoteService::new(SqlxQuoteRepository::boxed(migrated_pool().await))
    }

    #[test]
    fn test_normalize_city() {
        assert_eq!(normalize_city(" Riyadh ").unwrap(), "riyadh");
        assert_eq!(normalize_city("KHOBAR").unwrap(), "khobar");
        assert_eq!(normalize_city("Mecca").unwrap(), "other");
        assert!(normalize_city("R").is_err());
        assert!(normalize_city(&"a".repeat(101)).is_err());
    }

    proptest! {
        #[test]
        fn normalized_city_is_always_known(city in "[A-Za-z ]{2,40}") {
            if let Ok(normalized) = normalize_city(&city) {
                prop_assert!(KNOWN_CITIES.contains(&normalized.as_str()));
            }
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_phone_and_city() {
        let service = service().await;
        let quote = service
            .create(input(QuoteStyle::Modern, "Jeddah", "051-234-5678"))
            .await
            .unwrap();
        assert_eq!(quote.phone, "0512345678");
        assert_eq!(quote.city, "jeddah");
        assert_eq!(quote.status, QuoteStatus::New);
    }

    #[tokio::test]
    async fn test_invalid_phone() {
        let service = service().await;
        match service.create(input(QuoteStyle::Wood, "riyadh", "+966512345678")).await {
            Err(QuoteServiceError::ValidationError(msg)) => assert_eq!(msg, INVALID_PHONE_MESSAGE),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_phone_within_a_day() {
        let service = service().await;
        service
            .create(input(QuoteStyle::Modern, "riyadh", "0512345678"))
            .await
            .unwrap();
        match service
            .create(input(QuoteStyle::Classic, "dammam", "051 234 5678"))
            .await
        {
            Err(QuoteServiceError::Conflict(msg)) => assert_eq!(msg, DUPLICATE_MESSAGE),
            other => panic!("unexpected result: {:?}", other),
        }
        service
            .create(input(QuoteStyle::Classic, "dammam", "0598765432"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stats_and_filters() {
        let service = service().await;
        service.create(input(QuoteStyle::Modern, "riyadh", "0500000001")).await.unwrap();
        service.create(input(QuoteStyle::Modern, "Abha", "0500000002")).await.unwrap();
        let wood = service.create(input(QuoteStyle::Wood, "riyadh", "0500000003")).await.unwrap();
        service
            .update_status(wood.id, QuoteStatus::Contacted, Some("Called".into()))
            .await
            .unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_style.get("modern"), Some(&2));
        assert_eq!(stats.by_city.get("riyadh"), Some(&2));
        assert_eq!(stats.by_city.get("other"), Some(&1));
        assert_eq!(stats.by_status.get("new"), Some(&2));
        assert_eq!(stats.by_status.get("contacted"), Some(&1));

        assert_eq!(service.list(None, Some("RIYADH"), 0, 100).await.unwrap().len(), 2);
        let contacted = service
            .list(Some(QuoteStatus::Contacted), None, 0, 100)
            .await
            .unwrap();
        assert_eq!(contacted.len(), 1);
        assert_eq!(contacted[0].admin_notes.as_deref(), Some("Called"));
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let service = service().await;
        let quote = service
            .create(input(QuoteStyle::Aluminum, "khobar", "0511111111"))
            .await
            .unwrap();
        assert_eq!(service.get(quote.id).await.unwrap().id, quote.id);

        service.delete(quote.id).await.unwrap();
        match service.get(quote.id).await {
            Err(err @ QuoteServiceError::NotFound(_)) => assert_eq!(
                err.to_string(),
                format!("Quote request with id {} not found", quote.id)
            ),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            service.delete(quote.id).await,
            Err(QuoteServiceError::NotFound(_))
        ));
    }
}
