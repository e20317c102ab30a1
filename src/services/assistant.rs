//! Listing assistant
//!
//! Template and heuristic helpers for advertisers. Nothing here calls an
//! external provider; output is deterministic for a given input.

use crate::models::Listing;
use serde::{Deserialize, Serialize};

/// Hourly base rate before adjustments
pub const BASE_HOURLY_RATE: f64 = 25.0;

/// Cities priced at a premium
pub const HIGH_COST_CITIES: &[&str] = &["riyadh", "jeddah", "khobar"];

const HIGH_COST_MULTIPLIER: f64 = 1.25;
const HOURS_PER_DAY: f64 = 8.0;
const DAILY_DISCOUNT: f64 = 0.85;
const SQ_FT_PER_SQ_M: f64 = 10.7639;

#[derive(Debug, Clone, Deserialize)]
pub struct DescriptionRequest {
    pub title: String,
    pub city: String,
    /// new, used, ready or custom
    #[serde(rename = "type")]
    pub kitchen_type: String,
    /// wood, aluminum, mixed or unknown
    pub material: String,
    pub price: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceRequest {
    pub kitchen_type: String,
    pub city: String,
    pub square_footage: Option<i64>,
    pub equipment: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceSuggestion {
    pub suggested_price_per_hour: f64,
    pub suggested_price_per_day: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListingEnhancement {
    pub listing_id: i64,
    pub enhanced_description: String,
    pub suggested_price: f64,
    pub original_price: f64,
}

fn type_phrase(kitchen_type: &str) -> &str {
    match kitchen_type {
        "new" => "جديد",
        "used" => "مستعمل",
        "ready" => "جاهز",
        "custom" => "تفصيل",
        other => other,
    }
}

fn material_phrase(material: &str) -> &str {
    match material {
        "wood" => "خشب",
        "aluminum" => "ألمنيوم",
        "mixed" => "مختلط",
        "unknown" => "غير محدد",
        other => other,
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Arabic listing text from the kitchen type, material, price and notes
pub fn generate_description(request: &DescriptionRequest) -> String {
    let kitchen_type = request.kitchen_type.as_str();
    let material = request.material.as_str();
    let mut text = format!(
        "مطبخ {} مصنوع من {} في {}. ",
        type_phrase(kitchen_type),
        material_phrase(material),
        request.city.trim()
    );

    text.push_str(match kitchen_type {
        "new" => "هذا المطبخ جديد تمامًا ولم يُستخدم من قبل، مع تصميم عصري وجودة عالية. ",
        "used" => "مطبخ مستعمل بحالة جيدة، تم الحفاظ عليه بعناية. ",
        "ready" => "مطبخ جاهز للتركيب الفوري، مثالي لمن يبحث عن حل سريع. ",
        "custom" => "مطبخ مصمم خصيصًا حسب المواصفات المطلوبة. ",
        _ => "",
    });
    text.push_str(match material {
        "wood" => "الخشب يمنح المطبخ مظهرًا دافئًا وكلاسيكيًا. ",
        "aluminum" => "الألمنيوم يوفر متانة عالية ومقاومة للرطوبة. ",
        "mixed" => "مزيج من المواد يجمع بين الجمال والوظائف العملية. ",
        _ => "",
    });

    if let Some(price) = request.price.filter(|p| *p > 0.0) {
        text.push_str(&format!("متوفر بسعر منافس {:.0} ريال سعودي. ", price));
    }
    if let Some(notes) = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        text.push_str(notes);
        text.push(' ');
    }
    text.push_str("اتصل الآن للاستفسار والمعاينة!");
    text
}

fn type_multiplier(kitchen_type: &str) -> f64 {
    match kitchen_type.trim().to_lowercase().as_str() {
        "commercial" => 1.5,
        "professional" => 1.4,
        "home" => 0.8,
        "shared" => 0.9,
        "industrial" => 1.8,
        _ => 1.0,
    }
}

fn size_multiplier(square_footage: Option<i64>) -> f64 {
    match square_footage {
        Some(sq_ft) if sq_ft > 1000 => 1.3,
        Some(sq_ft) if sq_ft > 500 => 1.15,
        _ => 1.0,
    }
}

fn is_high_cost(city: &str) -> bool {
    let city = city.to_lowercase();
    HIGH_COST_CITIES.iter().any(|c| city.contains(c))
}

/// Hourly and daily rental price from type, size and city
pub fn suggest_price(request: &PriceRequest) -> PriceSuggestion {
    let mut hourly = BASE_HOURLY_RATE
        * type_multiplier(&request.kitchen_type)
        * size_multiplier(request.square_footage);
    if is_high_cost(&request.city) {
        hourly *= HIGH_COST_MULTIPLIER;
    }
    let daily = hourly * HOURS_PER_DAY * DAILY_DISCOUNT;

    let mut reasoning = format!(
        "Based on {} kitchen type in {}",
        request.kitchen_type, request.city
    );
    if let Some(sq_ft) = request.square_footage {
        reasoning.push_str(&format!(" with {} sq ft", sq_ft));
    }
    if let Some(equipment) = request.equipment.as_deref().filter(|e| !e.trim().is_empty()) {
        reasoning.push_str(&format!(", equipped with {}", equipment.trim()));
    }
    reasoning.push_str(&format!(
        ". Market analysis suggests {:.2} SAR/hour pricing.",
        hourly
    ));

    PriceSuggestion {
        suggested_price_per_hour: round_cents(hourly),
        suggested_price_per_day: round_cents(daily),
        reasoning,
    }
}

/// Floor area in square feet when both length and width are known
fn floor_area_sq_ft(listing: &Listing) -> Option<i64> {
    match (listing.length_m, listing.width_m) {
        (Some(length), Some(width)) => Some((length * width * SQ_FT_PER_SQ_M).round() as i64),
        _ => None,
    }
}

/// Marketing copy and a price hint for an existing listing
pub fn enhance_listing(listing: &Listing) -> ListingEnhancement {
    let kitchen_type = listing
        .listing_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("commercial");
    let square_footage = floor_area_sq_ft(listing);

    let mut parts = vec![
        format!("Beautiful {} kitchen", kitchen_type.to_lowercase()),
        format!("located in {}", listing.city),
    ];
    if let Some(sq_ft) = square_footage {
        parts.push(format!("featuring {} sq ft of workspace", sq_ft));
    }
    if let Some(material) = listing.material.as_deref().filter(|m| !m.trim().is_empty()) {
        parts.push(format!("built in {}", material.trim()));
    }
    if let Some(description) = listing.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        parts.push(description.trim_end_matches('.').to_string());
    }

    let enhanced_description = format!(
        "{}. Perfect for food entrepreneurs, catering businesses, and culinary professionals. \
         Ready for immediate use with flexible viewing appointments.",
        parts.join(", ")
    );

    let price = suggest_price(&PriceRequest {
        kitchen_type: kitchen_type.to_string(),
        city: listing.city.clone(),
        square_footage,
        equipment: None,
    });

    ListingEnhancement {
        listing_id: listing.id,
        enhanced_description,
        suggested_price: price.suggested_price_per_hour,
        original_price: listing.price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingStatus;
    use chrono::Utc;
    use proptest::prelude::*;

    fn price_request(kitchen_type: &str, city: &str, sq_ft: Option<i64>) -> PriceRequest {
        PriceRequest {
            kitchen_type: kitchen_type.to_string(),
            city: city.to_string(),
            square_footage: sq_ft,
            equipment: None,
        }
    }

    fn listing() -> Listing {
        Listing {
            id: 7,
            title: "Compact kitchen".to_string(),
            description: Some("Includes oven and hood.".to_string()),
            price: 4500.0,
            city: "Dammam".to_string(),
            listing_type: Some("Home".to_string()),
            material: Some("wood".to_string()),
            length_m: Some(5.0),
            width_m: Some(4.0),
            height_m: None,
            status: ListingStatus::Approved,
            is_featured: false,
            featured_until: None,
            owner_id: 1,
            rejection_reason: None,
            reviewed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_description_known_phrases() {
        let text = generate_description(&DescriptionRequest {
            title: "مطبخ".to_string(),
            city: "الرياض".to_string(),
            kitchen_type: "new".to_string(),
            material: "wood".to_string(),
            price: Some(12499.6),
            notes: Some("  التوصيل مجاني ".to_string()),
        });
        assert!(text.starts_with("مطبخ جديد مصنوع من خشب في الرياض. "));
        assert!(text.contains("الخشب يمنح"));
        assert!(text.contains("12500 ريال سعودي"));
        assert!(text.contains("التوصيل مجاني "));
        assert!(text.ends_with("اتصل الآن للاستفسار والمعاينة!"));
    }

    #[test]
    fn test_description_echoes_unknown_values() {
        let text = generate_description(&DescriptionRequest {
            title: "Kitchen".to_string(),
            city: "Abha".to_string(),
            kitchen_type: "granite".to_string(),
            material: "marble".to_string(),
            price: None,
            notes: None,
        });
        assert_eq!(text, "مطبخ granite مصنوع من marble في Abha. اتصل الآن للاستفسار والمعاينة!");
    }

    #[test]
    fn test_suggest_price() {
        let plain = suggest_price(&price_request("unknown", "Abha", None));
        assert_eq!(plain.suggested_price_per_hour, 25.0);
        assert_eq!(plain.suggested_price_per_day, 170.0);

        let home = suggest_price(&price_request("Home", "Abha", Some(600)));
        assert_eq!(home.suggested_price_per_hour, 23.0);

        let premium = suggest_price(&price_request("industrial", "North Riyadh", Some(700)));
        assert_eq!(premium.suggested_price_per_hour, 64.69);
        assert!(premium.reasoning.contains("700 sq ft"));
    }

    #[test]
    fn test_enhance_listing() {
        let enhancement = enhance_listing(&listing());
        assert_eq!(enhancement.listing_id, 7);
        assert_eq!(enhancement.original_price, 4500.0);
        // 20 m2 is about 215 sq ft, so no size premium
        assert_eq!(enhancement.suggested_price, 20.0);
        assert!(enhancement
            .enhanced_description
            .starts_with("Beautiful home kitchen, located in Dammam, featuring 215 sq ft"));
        assert!(enhancement.enhanced_description.contains("Includes oven and hood"));
    }

    proptest! {
        #[test]
        fn bigger_kitchens_never_cost_less(
            kind in prop::sample::select(vec!["commercial", "home", "shared", "other"]),
            small in 0i64..5000,
            extra in 0i64..5000,
        ) {
            let a = suggest_price(&price_request(kind, "Abha", Some(small)));
            let b = suggest_price(&price_request(kind, "Abha", Some(small + extra)));
            prop_assert!(b.suggested_price_per_hour >= a.suggested_price_per_hour);
            prop_assert!(b.suggested_price_per_day >= a.suggested_price_per_day);
        }

        #[test]
        fn daily_price_tracks_hourly(sq_ft in prop::option::of(0i64..5000)) {
            let p = suggest_price(&price_request("professional", "Jeddah", sq_ft));
            let expected = p.suggested_price_per_hour * HOURS_PER_DAY * DAILY_DISCOUNT;
            prop_assert!((p.suggested_price_per_day - expected).abs() < 0.1);
        }
    }
}
