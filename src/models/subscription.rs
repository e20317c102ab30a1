//! Subscription model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// Lifecycle of a subscription
    pub enum SubscriptionStatus ("subscription status") {
        Active => "active",
        Expired => "expired",
        Cancelled => "cancelled",
        /// Created, waiting for payment confirmation
        Pending => "pending",
    }
}

string_enum! {
    /// Payment bookkeeping, independent of the lifecycle status
    pub enum PaymentStatus ("payment status") {
        Paid => "paid",
        Pending => "pending",
        Failed => "failed",
        Refunded => "refunded",
    }
}

/// Subscription entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    /// Cleared when the plan is removed
    pub plan_id: Option<i64>,
    #[sqlx(try_from = "String")]
    pub status: SubscriptionStatus,
    #[sqlx(try_from = "String")]
    pub payment_status: PaymentStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub amount: f64,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Active and not past its end date
    pub fn is_in_force(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date > now
    }
}

/// Input for inserting a subscription
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: i64,
    pub plan_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub amount: f64,
    pub payment_method: Option<String>,
}

/// Subscription joined with plan and user names (listings and admin views)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubscriptionWithNames {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub subscription: Subscription,
    pub plan_name: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}
