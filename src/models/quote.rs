//! Quote request model
//!
//! Quote requests are anonymous leads: a visitor leaves a kitchen style,
//! a city and a phone number, and sales follows up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// Requested kitchen style
    pub enum QuoteStyle ("kitchen style") {
        Modern => "modern",
        Classic => "classic",
        Wood => "wood",
        Aluminum => "aluminum",
    }
}

string_enum! {
    /// Sales pipeline state
    pub enum QuoteStatus ("quote status") {
        New => "new",
        Contacted => "contacted",
        Quoted => "quoted",
        Converted => "converted",
        Lost => "lost",
    }
}

impl Default for QuoteStatus {
    fn default() -> Self {
        Self::New
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct QuoteRequest {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub style: QuoteStyle,
    /// Normalized city key (riyadh, jeddah, dammam, khobar or other)
    pub city: String,
    /// Normalized `05XXXXXXXX` phone
    pub phone: String,
    #[sqlx(try_from = "String")]
    pub status: QuoteStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated and normalized input
#[derive(Debug, Clone)]
pub struct NewQuoteRequest {
    pub style: QuoteStyle,
    pub city: String,
    pub phone: String,
}
