//! Value-level normalization of raw directory documents.

use regex::Regex;
use serde_json::{Map, Value};

pub const MAX_RATING: f64 = 5.0;
pub const FALLBACK_CAFE_IMAGE: &str = "/fallbackcafe.png";
pub const FALLBACK_SANDWICH_IMAGE: &str = "/fallbacksandwich.png";
pub const NEW_YORK_CITY: &str = "New York";
pub const NEW_YORK_STATE: &str = "NY";
pub const NEW_YORK_COUNTRY: &str = "USA";

const CAFE_CATEGORIES: [&str; 4] = ["cafes", "cafeteria", "hong kong style cafe", "themed cafes"];

const SANDWICH_CATEGORIES: [&str; 5] = [
    "sandwiches",
    "sandwich shop",
    "sandwich shops",
    "sandwiches & wraps",
    "sandwiches and wraps",
];

/// Canonical location. Empty fields are absent, never `""`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl Location {
    fn new_york() -> Self {
        Self {
            city: Some(NEW_YORK_CITY.to_string()),
            state: Some(NEW_YORK_STATE.to_string()),
            country: Some(NEW_YORK_COUNTRY.to_string()),
        }
    }
}

/// Rating prepared for star rendering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StarRating {
    /// Whole stars, 0 to 5.
    pub rounded: u8,
    /// Clamped, unrounded value.
    pub display: f64,
}

impl StarRating {
    #[must_use]
    pub fn display_label(&self) -> String {
        format!("{:.1}", self.display)
    }
}

/// Numbers pass through; strings accept a decimal comma and the first signed
/// decimal found wins. Anything else is 0. The result is clamped to `[0, 5]`.
#[must_use]
pub fn normalize_rating(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => parse_rating_text(text),
        _ => 0.0,
    };
    clamp_rating(parsed)
}

fn parse_rating_text(text: &str) -> f64 {
    let normalized = text.trim().replacen(',', ".", 1);
    Regex::new(r"-?\d+(\.\d+)?")
        .ok()
        .and_then(|re| re.find(&normalized).map(|found| found.as_str().to_string()))
        .and_then(|found| found.parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn clamp_rating(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, MAX_RATING)
    }
}

#[must_use]
pub fn star_rating(rating: f64) -> StarRating {
    let display = clamp_rating(rating);
    // display is within [0, 5], so the cast cannot truncate
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rounded = display.round() as u8;
    StarRating { rounded, display }
}

/// Trims and collapses inner whitespace.
#[must_use]
pub fn normalize_category_label(label: &str) -> String {
    label.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `categories` as a list, then `categories` as a comma-separated string, then
/// the scalar `category`. Empty labels are dropped.
#[must_use]
pub fn normalize_categories(fields: &Map<String, Value>) -> Vec<String> {
    let labels: Vec<String> = match fields.get("categories") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(joined)) => joined.split(',').map(ToString::to_string).collect(),
        _ => fields
            .get("category")
            .and_then(scalar_text)
            .into_iter()
            .collect(),
    };
    labels
        .iter()
        .map(|label| normalize_category_label(label))
        .filter(|label| !label.is_empty())
        .collect()
}

fn in_set(categories: &[String], set: &[&str]) -> bool {
    categories
        .iter()
        .any(|category| set.contains(&category.to_lowercase().as_str()))
}

#[must_use]
pub fn has_cafe_category(categories: &[String]) -> bool {
    in_set(categories, &CAFE_CATEGORIES)
}

#[must_use]
pub fn has_sandwich_category(categories: &[String]) -> bool {
    in_set(categories, &SANDWICH_CATEGORIES)
}

/// Fallback asset for records flagged as using one. Sandwich beats cafe.
#[must_use]
pub fn resolve_fallback_image(fallback_applied: bool, categories: &[String]) -> Option<&'static str> {
    if !fallback_applied {
        return None;
    }
    if has_sandwich_category(categories) {
        Some(FALLBACK_SANDWICH_IMAGE)
    } else if has_cafe_category(categories) {
        Some(FALLBACK_CAFE_IMAGE)
    } else {
        None
    }
}

/// `address` and `street` joined with ", ", when either is present.
#[must_use]
pub fn source_address(fields: &Map<String, Value>) -> Option<String> {
    let parts: Vec<String> = ["address", "street"]
        .iter()
        .filter_map(|key| text_field(fields, key))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Any "<number> <street>, New York" address forces the canonical New York
/// location; otherwise stored fields pass through.
#[must_use]
pub fn normalize_location(fields: &Map<String, Value>) -> Location {
    let is_new_york = source_address(fields).is_some_and(|address| {
        Regex::new(r"(?i)\b\d+\s+[^,]+,?\s*new york\b").is_ok_and(|re| re.is_match(&address))
    });
    if is_new_york {
        return Location::new_york();
    }
    Location {
        city: text_field(fields, "city"),
        state: text_field(fields, "state"),
        country: text_field(fields, "country"),
    }
}

#[must_use]
pub fn is_external_url(value: &str) -> bool {
    Regex::new(r"(?i)^https?://").is_ok_and(|re| re.is_match(value))
}

/// Object-storage path of the record's picture.
#[must_use]
pub fn storage_path(fields: &Map<String, Value>, collection: &str, id: &str) -> String {
    ["imagePath", "photoPath", "storagePath"]
        .iter()
        .find_map(|key| text_field(fields, key))
        .or_else(|| text_field(fields, "photo").filter(|photo| !is_external_url(photo)))
        .unwrap_or_else(|| format!("{collection}/{id}.jpg"))
}

/// Truthiness of a loosely typed flag.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
        Value::Null => false,
    }
}

/// First present, non-null value among `keys`.
#[must_use]
pub fn first_present<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| fields.get(*key).filter(|value| !value.is_null()))
}

/// Non-blank string (or number rendered as one) at `key`, trimmed.
#[must_use]
pub fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
