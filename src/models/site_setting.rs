//! Site setting model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key-value configuration row managed from the admin panel
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SiteSetting {
    pub id: i64,
    #[sqlx(rename = "setting_key")]
    pub key: String,
    pub value: Option<String>,
    pub description: Option<String>,
    /// Readable without authentication
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
