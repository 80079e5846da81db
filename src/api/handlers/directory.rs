//! Directory listings: normalized, filtered, with facets for the selectors.

use axum::{
    extract::{Extension, Query},
    http::{header::COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use super::{access::require_pin, ErrorBody};
use crate::{
    api::AppState,
    directory::{
        filter_records, normalize_records, DirectoryRecord, Facets, LoadFailure, RecordFilter,
    },
    store::Collection,
};

/// Cookie carrying the per-install scope of the employee collection.
pub const INSTALL_COOKIE: &str = "dirgate_install";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Case-insensitive substring of the name.
    pub name: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    /// Case-insensitive category label.
    pub category: Option<String>,
    /// Inclusive minimum rating, 0 to 5.
    pub min_rating: Option<f64>,
}

impl ListQuery {
    /// Location values are applied outermost first so the cascade keeps them.
    #[must_use]
    pub fn filter(&self) -> RecordFilter {
        let mut filter = RecordFilter::new();
        if let Some(name) = &self.name {
            filter.set_name(name);
        }
        if let Some(country) = &self.country {
            filter.set_country(country);
        }
        if let Some(state) = &self.state {
            filter.set_state(state);
        }
        if let Some(city) = &self.city {
            filter.set_city(city);
        }
        if let Some(category) = &self.category {
            filter.set_category(category);
        }
        filter.set_min_rating(self.min_rating);
        filter
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlagView {
    pub alt: String,
    pub src: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordView {
    pub id: String,
    pub name: String,
    /// Fallback asset or a directly usable photo URL.
    pub image: Option<String>,
    pub storage_path: String,
    pub categories: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub flag: Option<FlagView>,
    pub address: String,
    pub rating: f64,
    pub stars: u8,
    pub rating_label: String,
}

impl From<&DirectoryRecord> for RecordView {
    fn from(record: &DirectoryRecord) -> Self {
        let stars = record.stars();
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            image: record.display_image(),
            storage_path: record.storage_path.clone(),
            categories: record.categories.clone(),
            city: record.location.city.clone(),
            state: record.location.state.clone(),
            country: record.location.country.clone(),
            flag: record.flag().map(|flag| FlagView {
                alt: flag.alt.to_string(),
                src: flag.src.to_string(),
            }),
            address: record.address_line().to_string(),
            rating: stars.display,
            stars: stars.rounded,
            rating_label: stars.display_label(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetsView {
    pub countries: Vec<String>,
    pub states: Vec<String>,
    pub cities: Vec<String>,
    pub categories: Vec<String>,
}

impl From<Facets> for FacetsView {
    fn from(facets: Facets) -> Self {
        Self {
            countries: facets.countries,
            states: facets.states,
            cities: facets.cities,
            categories: facets.categories,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Listing {
    pub total: usize,
    pub records: Vec<RecordView>,
    pub facets: FacetsView,
}

#[utoipa::path(
    get,
    path = "/v1/restaurants",
    params(ListQuery),
    responses(
        (status = 200, description = "Filtered restaurants", body = Listing),
        (status = 401, description = "PIN not verified", body = ErrorBody),
        (status = 403, description = "Directory store denied the read", body = ErrorBody),
        (status = 500, description = "Directory store failure", body = ErrorBody),
        (status = 503, description = "PIN gateway unreachable", body = ErrorBody)
    ),
    tag = "directory"
)]
pub async fn restaurants(
    state: Extension<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Err(response) = require_pin(&headers, &state).await {
        return response;
    }
    list(&state, Collection::Restaurants, &query).await
}

#[utoipa::path(
    get,
    path = "/v1/employees",
    params(ListQuery),
    responses(
        (status = 200, description = "Filtered employees of this install", body = Listing),
        (status = 400, description = "Missing install cookie", body = ErrorBody),
        (status = 401, description = "PIN not verified", body = ErrorBody),
        (status = 403, description = "Directory store denied the read", body = ErrorBody),
        (status = 500, description = "Directory store failure", body = ErrorBody),
        (status = 503, description = "PIN gateway unreachable", body = ErrorBody)
    ),
    tag = "directory"
)]
pub async fn employees(
    state: Extension<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    if let Err(response) = require_pin(&headers, &state).await {
        return response;
    }
    let Some(install_id) = install_id(&headers) else {
        warn!("employee listing without install cookie");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("Missing install identifier.")),
        )
            .into_response();
    };
    list(&state, Collection::Employees { install_id }, &query).await
}

async fn list(state: &AppState, collection: Collection, query: &ListQuery) -> Response {
    let raw = match state.directory.list(&collection).await {
        Ok(raw) => raw,
        Err(err) => {
            let (status, message) = match LoadFailure::from_store(&collection, &err) {
                LoadFailure::Denied => (
                    StatusCode::FORBIDDEN,
                    "Missing or insufficient permissions.".to_string(),
                ),
                LoadFailure::Unavailable(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
            };
            return (status, Json(ErrorBody::new(&message))).into_response();
        }
    };

    let records = normalize_records(&collection, &raw);
    // Detached; the backfill logs its own failures.
    drop(state.backfill.schedule(collection, records.clone()));

    let filter = query.filter();
    let facets = Facets::collect(&records, &filter);
    let views: Vec<RecordView> = filter_records(&records, &filter)
        .into_iter()
        .map(RecordView::from)
        .collect();

    (
        StatusCode::OK,
        Json(Listing {
            total: views.len(),
            records: views,
            facets: facets.into(),
        }),
    )
        .into_response()
}

fn install_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(COOKIE)?.to_str().ok()?;
    value.split(';').find_map(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        (key == INSTALL_COOKIE && !val.is_empty()).then(|| val.to_string())
    })
}
