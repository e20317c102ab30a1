//! Data models
//!
//! Database entities of the KitchenTech marketplace and the input types the
//! services accept:
//! - accounts (User, login audit)
//! - listings, their images and favorites
//! - plans and subscriptions
//! - contact messages and quote requests (public leads)
//! - site settings

/// Declare a lowercase string enum stored as TEXT.
///
/// Generates `as_str`, `ALL`, `Display`, `FromStr` (case-insensitive) and
/// `TryFrom<String>` so the type can be decoded with `#[sqlx(try_from = "String")]`.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($label:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "lowercase")]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stored/serialized form
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $( $text => Ok($name::$variant), )+
                    _ => Err(anyhow::anyhow!("Invalid {}: {}", $label, s)),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = anyhow::Error;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

mod contact;
mod favorite;
mod listing;
mod login_log;
mod plan;
mod quote;
mod site_setting;
mod subscription;
mod user;

pub use contact::{ContactMessage, ContactStatus, ContactType, NewContactMessage};
pub use favorite::{Favorite, FavoriteWithListing};
pub use listing::{
    Listing, ListingImage, ListingQuery, ListingStatus, ListingWithOwner, NewListing,
    NewListingImage,
};
pub use login_log::NewLoginLog;
pub use plan::{NewPlan, Plan, PlanType};
pub use quote::{NewQuoteRequest, QuoteRequest, QuoteStatus, QuoteStyle};
pub use site_setting::SiteSetting;
pub use subscription::{
    NewSubscription, PaymentStatus, Subscription, SubscriptionStatus, SubscriptionWithNames,
};
pub use user::{NewUser, User, UserRole, UserStatus, UserWithAdsCount};

#[cfg(test)]
pub(crate) use user::sample_user;
