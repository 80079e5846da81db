//! Canonical directory record, built once right after fetch.

use super::{
    flags::{flag_for_country, FlagAsset},
    normalize::{
        first_present, is_external_url, normalize_categories, normalize_location,
        normalize_rating, resolve_fallback_image, source_address, star_rating, storage_path,
        text_field, truthy, Location, StarRating,
    },
};
use crate::store::{Collection, RawRecord};

pub const ADDRESS_UNAVAILABLE: &str = "Address unavailable.";

#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryRecord {
    pub id: String,
    pub name: String,
    /// Stored `photo` value, untouched.
    pub photo: Option<String>,
    pub storage_path: String,
    pub fallback_applied: bool,
    /// Normalized, within `[0, 5]`.
    pub rating: f64,
    pub categories: Vec<String>,
    pub location: Location,
    pub address: Option<String>,
}

impl DirectoryRecord {
    #[must_use]
    pub fn from_raw(collection: &Collection, raw: &RawRecord) -> Self {
        let fields = &raw.fields;
        let name = text_field(fields, "name")
            .or_else(|| text_field(fields, "displayName"))
            .unwrap_or_default();
        let fallback_applied =
            first_present(fields, &["fallbackApplied", "fallbackapplied"]).is_some_and(truthy);
        let rating = first_present(fields, &["starsgiven", "rating", "grade"])
            .map_or(0.0, normalize_rating);

        Self {
            id: raw.id.clone(),
            name,
            photo: text_field(fields, "photo"),
            storage_path: storage_path(fields, collection.name(), &raw.id),
            fallback_applied,
            rating,
            categories: normalize_categories(fields),
            location: normalize_location(fields),
            address: source_address(fields),
        }
    }

    #[must_use]
    pub fn fallback_image(&self) -> Option<&'static str> {
        resolve_fallback_image(self.fallback_applied, &self.categories)
    }

    /// Fallback asset first, then a stored photo that can be shown as is.
    #[must_use]
    pub fn display_image(&self) -> Option<String> {
        if let Some(fallback) = self.fallback_image() {
            return Some(fallback.to_string());
        }
        self.photo
            .as_deref()
            .filter(|photo| is_external_url(photo) || photo.starts_with('/'))
            .map(ToString::to_string)
    }

    /// Whether the stored photo still disagrees with the resolved fallback.
    #[must_use]
    pub fn needs_photo_backfill(&self) -> Option<&'static str> {
        self.fallback_image()
            .filter(|fallback| self.photo.as_deref() != Some(*fallback))
    }

    #[must_use]
    pub fn stars(&self) -> StarRating {
        star_rating(self.rating)
    }

    #[must_use]
    pub fn flag(&self) -> Option<FlagAsset> {
        flag_for_country(self.location.country.as_deref())
    }

    #[must_use]
    pub fn address_line(&self) -> &str {
        self.address.as_deref().unwrap_or(ADDRESS_UNAVAILABLE)
    }
}

/// Normalizes a fetched batch.
#[must_use]
pub fn normalize_records(collection: &Collection, raw: &[RawRecord]) -> Vec<DirectoryRecord> {
    raw.iter()
        .map(|record| DirectoryRecord::from_raw(collection, record))
        .collect()
}
