//! Input normalization shared by the account and lead services

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Saudi mobile number: 05 followed by 8 digits
static SAUDI_MOBILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^05\d{8}$").expect("phone pattern is valid"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

pub const INVALID_PHONE_MESSAGE: &str =
    "Phone number must be 10 digits starting with 05 (e.g., 0512345678)";

/// Strip spaces, dashes and parentheses, then require `05XXXXXXXX`.
///
/// Returns the normalized number, or `None` when it does not match.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let phone: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    SAUDI_MOBILE_RE.is_match(&phone).then_some(phone)
}

/// Trimmed value, or `None` when blank
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_email() {
        assert!(is_valid_email("owner@kitchentech.sa"));
        assert!(is_valid_email(" owner@kitchentech.sa "));
        assert!(!is_valid_email("owner@kitchentech"));
        assert!(!is_valid_email("owner kitchentech.sa"));
        assert!(!is_valid_email("@kitchentech.sa"));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("0512345678").as_deref(), Some("0512345678"));
        assert_eq!(normalize_phone("051 234 5678").as_deref(), Some("0512345678"));
        assert_eq!(normalize_phone("(051)-234-5678").as_deref(), Some("0512345678"));
        assert_eq!(normalize_phone("+966512345678"), None);
        assert_eq!(normalize_phone("0612345678"), None);
        assert_eq!(normalize_phone("051234567"), None);
        assert_eq!(normalize_phone("05123456789"), None);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  x ".to_string())).as_deref(), Some("x"));
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }

    proptest! {
        #[test]
        fn prop_separators_are_ignored(digits in "[0-9]{8}", seps in proptest::collection::vec(prop_oneof![Just(' '), Just('-'), Just('('), Just(')')], 0..6)) {
            let mut raw = format!("05{}", digits);
            for (i, sep) in seps.iter().enumerate() {
                let at = (i * 3) % raw.len();
                raw.insert(at, *sep);
            }
            prop_assert_eq!(normalize_phone(&raw), Some(format!("05{}", digits)));
        }

        #[test]
        fn prop_normalized_is_ten_digits(raw in "\\PC{0,20}") {
            if let Some(phone) = normalize_phone(&raw) {
                prop_assert_eq!(phone.len(), 10);
                prop_assert!(phone.starts_with("05"));
                prop_assert!(phone.chars().all(|c| c.is_ascii_digit()));
            }
        }
    }
}
