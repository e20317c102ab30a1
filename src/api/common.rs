//! Common API utilities and shared types
//!
//! This module contains shared utilities used across multiple API endpoints.

use serde::{Deserialize, Serialize};

use crate::api::middleware::ApiError;

// ============================================================================
// Pagination Defaults
// ============================================================================

/// Upper bound for `limit`
pub const MAX_LIMIT: i64 = 100;

pub fn default_skip() -> i64 {
    0
}

pub fn default_limit() -> i64 {
    MAX_LIMIT
}

// ============================================================================
// Pagination Query Types
// ============================================================================

/// `skip`/`limit` pagination query parameters
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_skip")]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: default_skip(),
            limit: default_limit(),
        }
    }
}

impl Pagination {
    /// `(offset, limit)` once `skip >= 0` and `1 <= limit <= 100` hold
    pub fn validate(self) -> Result<(i64, i64), ApiError> {
        validate_page(self.skip, self.limit)
    }
}

pub fn validate_page(skip: i64, limit: i64) -> Result<(i64, i64), ApiError> {
    if skip < 0 {
        return Err(ApiError::validation_error("skip must be zero or positive"));
    }
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation_error(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok((skip, limit))
}

/// `{"message": ...}` body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let page: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(page.validate().unwrap(), (0, 100));
    }

    #[test]
    fn test_bounds() {
        assert!(validate_page(-1, 10).is_err());
        assert!(validate_page(0, 0).is_err());
        assert!(validate_page(0, 101).is_err());
        assert_eq!(validate_page(20, 1).unwrap(), (20, 1));
    }

    proptest! {
        #[test]
        fn accepted_pages_are_in_range(skip in -50i64..500, limit in -10i64..200) {
            match validate_page(skip, limit) {
                Ok((s, l)) => {
                    prop_assert!(s >= 0);
                    prop_assert!((1..=MAX_LIMIT).contains(&l));
                }
                Err(e) => prop_assert_eq!(e.error.code, "VALIDATION_ERROR"),
            }
        }
    }
}
