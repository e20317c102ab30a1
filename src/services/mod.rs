//! Services layer - Business logic
//!
//! This module contains the business logic of the KitchenTech marketplace.
//! Services are responsible for:
//! - Implementing business rules (moderation, subscriptions, lead intake)
//! - Coordinating between repositories and the upload directory
//! - Handling validation and error cases

pub mod admin;
pub mod assistant;
pub mod contact;
pub mod favorite;
pub mod image;
pub mod listing;
pub mod maintenance;
pub mod password;
pub mod plan;
pub mod quote;
pub mod rate_limiter;
pub mod settings;
pub mod token;
pub mod user;
pub mod validation;

pub use admin::{AdminService, AdminServiceError, DashboardStats, UserAdminUpdate};
pub use contact::{ContactInput, ContactService, ContactServiceError};
pub use favorite::{FavoriteService, FavoriteServiceError};
pub use image::{ImageService, ImageServiceError, ImageUpload};
pub use listing::{
    ListingFilters, ListingInput, ListingPatch, ListingService, ListingServiceError, OwnerFilter,
};
pub use maintenance::MaintenanceService;
pub use password::{hash_password, verify_password};
pub use plan::{PlanService, PlanServiceError};
pub use quote::{QuoteInput, QuoteService, QuoteServiceError, QuoteStats};
pub use rate_limiter::{lead_limiter, LoginRateLimiter, SlidingWindow};
pub use settings::{SettingUpdate, SettingView, SettingsService, SettingsServiceError};
pub use token::{Claims, TokenError, TokenService};
pub use user::{
    AccessToken, ClientInfo, Credential, ProfileUpdate, RegisterInput, UserService,
    UserServiceError,
};
