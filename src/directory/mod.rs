//! Directory normalizer and filter engine.
//!
//! Raw documents become [`DirectoryRecord`]s at the store boundary; filters,
//! facets and photo backfill only ever see canonical records.

mod backfill;
mod filter;
mod flags;
mod loader;
mod normalize;
mod record;

pub use backfill::{BackfillReport, PhotoBackfill};
pub use filter::{filter_records, Facets, RecordFilter};
pub use flags::{flag_for_country, normalize_key, FlagAsset};
pub use loader::{DirectoryLoader, LoadFailure, STORE_NOT_CONFIGURED};
pub use normalize::{
    has_cafe_category, has_sandwich_category, is_external_url, normalize_categories,
    normalize_category_label, normalize_location, normalize_rating, resolve_fallback_image,
    star_rating, storage_path, Location, StarRating, FALLBACK_CAFE_IMAGE,
    FALLBACK_SANDWICH_IMAGE,
};
pub use record::{normalize_records, DirectoryRecord, ADDRESS_UNAVAILABLE};
