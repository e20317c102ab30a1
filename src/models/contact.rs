//! Contact message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// Subject of a contact message
    pub enum ContactType ("message type") {
        Suggestion => "suggestion",
        Problem => "problem",
        Partnership => "partnership",
        Advertisement => "advertisement",
    }
}

string_enum! {
    /// Admin follow-up state
    pub enum ContactStatus ("message status") {
        New => "new",
        Read => "read",
        Replied => "replied",
        Closed => "closed",
    }
}

impl Default for ContactStatus {
    fn default() -> Self {
        Self::New
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub message_type: ContactType,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub status: ContactStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub message_type: ContactType,
    pub message: String,
}
