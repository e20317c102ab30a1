//! Contact message service

use crate::db::repositories::ContactRepository;
use crate::models::{ContactMessage, ContactStatus, ContactType, NewContactMessage};
use crate::services::validation::{is_valid_email, non_blank};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;

const MAX_NAME_LENGTH: usize = 100;
const MAX_MESSAGE_LENGTH: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ContactServiceError {
    #[error("Message not found")]
    NotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Public contact form
#[derive(Debug, Clone, Deserialize)]
pub struct ContactInput {
    pub name: String,
    pub email: String,
    pub message_type: ContactType,
    pub message: String,
}

pub struct ContactService {
    messages: Arc<dyn ContactRepository>,
}

impl ContactService {
    pub fn new(messages: Arc<dyn ContactRepository>) -> Self {
        Self { messages }
    }

    pub async fn create(&self, input: ContactInput) -> Result<ContactMessage, ContactServiceError> {
        let name = non_blank(Some(input.name))
            .ok_or_else(|| ContactServiceError::ValidationError("Name is required".to_string()))?;
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ContactServiceError::ValidationError(format!(
                "Name must be at most {} characters",
                MAX_NAME_LENGTH
            )));
        }
        if !is_valid_email(&input.email) {
            return Err(ContactServiceError::ValidationError(
                "Invalid email address".to_string(),
            ));
        }
        let message = non_blank(Some(input.message)).ok_or_else(|| {
            ContactServiceError::ValidationError("Message is required".to_string())
        })?;
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ContactServiceError::ValidationError(format!(
                "Message must be at most {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let created = self
            .messages
            .create(&NewContactMessage {
                name,
                email: input.email.trim().to_lowercase(),
                message_type: input.message_type,
                message,
            })
            .await
            .context("Failed to save contact message")?;

        tracing::info!(id = created.id, kind = %created.message_type, "Contact message received");
        Ok(created)
    }

    pub async fn list(
        &self,
        status: Option<ContactStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ContactMessage>, ContactServiceError> {
        Ok(self.messages.list(status, offset, limit).await?)
    }

    /// Move a message through the follow-up states; notes are kept when absent
    pub async fn update_status(
        &self,
        id: i64,
        status: ContactStatus,
        admin_notes: Option<String>,
    ) -> Result<ContactMessage, ContactServiceError> {
        if self.messages.get_by_id(id).await?.is_none() {
            return Err(ContactServiceError::NotFound);
        }
        let notes = non_blank(admin_notes);
        self.messages
            .update_status(id, status, notes.as_deref())
            .await
            .context("Failed to update contact message")?;

        self.messages
            .get_by_id(id)
            .await?
            .ok_or(ContactServiceError::NotFound)
    }
}
