//! Subscription plan model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// Plan tier
    pub enum PlanType ("plan type") {
        Bronze => "bronze",
        Silver => "silver",
        Gold => "gold",
    }
}

/// Plan entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: i64,
    /// Arabic display name
    pub name: String,
    pub name_en: Option<String>,
    #[sqlx(try_from = "String")]
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub price: f64,
    pub duration_days: i64,
    /// `None` means unlimited listings
    pub max_ads: Option<i64>,
    pub featured_ads: i64,
    pub priority_support: bool,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting a plan
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub name: String,
    pub name_en: Option<String>,
    pub plan_type: PlanType,
    pub price: f64,
    pub duration_days: i64,
    pub max_ads: Option<i64>,
    pub featured_ads: i64,
    pub priority_support: bool,
    pub description: Option<String>,
}

impl NewPlan {
    /// The three tiers offered out of the box
    pub fn defaults() -> Vec<NewPlan> {
        vec![
            NewPlan {
                name: "برونزي".to_string(),
                name_en: Some("Bronze".to_string()),
                plan_type: PlanType::Bronze,
                price: 199.0,
                duration_days: 30,
                max_ads: Some(10),
                featured_ads: 0,
                priority_support: false,
                description: Some("Up to 10 listings per month".to_string()),
            },
            NewPlan {
                name: "فضي".to_string(),
                name_en: Some("Silver".to_string()),
                plan_type: PlanType::Silver,
                price: 499.0,
                duration_days: 30,
                max_ads: Some(30),
                featured_ads: 2,
                priority_support: false,
                description: Some("Up to 30 listings and 2 featured listings".to_string()),
            },
            NewPlan {
                name: "ذهبي".to_string(),
                name_en: Some("Gold".to_string()),
                plan_type: PlanType::Gold,
                price: 999.0,
                duration_days: 30,
                max_ads: None,
                featured_ads: 5,
                priority_support: true,
                description: Some(
                    "Unlimited listings, 5 featured listings and priority support".to_string(),
                ),
            },
        ]
    }
}
