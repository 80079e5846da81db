//! Conjunctive record filter and the facet lists that drive its selectors.

use std::collections::{BTreeSet, HashSet};

use super::record::DirectoryRecord;

/// Every field empty (or `None`) matches everything.
///
/// Location setters cascade: a new country clears state and city, a new state
/// clears city.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordFilter {
    name: String,
    country: String,
    state: String,
    city: String,
    category: String,
    min_rating: Option<f64>,
}

impl RecordFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.trim().to_string();
    }

    pub fn set_country(&mut self, country: &str) {
        self.country = country.trim().to_string();
        self.state.clear();
        self.city.clear();
    }

    pub fn set_state(&mut self, state: &str) {
        self.state = state.trim().to_string();
        self.city.clear();
    }

    pub fn set_city(&mut self, city: &str) {
        self.city = city.trim().to_string();
    }

    pub fn set_category(&mut self, category: &str) {
        self.category = category.trim().to_string();
    }

    pub fn set_min_rating(&mut self, min_rating: Option<f64>) {
        self.min_rating = min_rating;
    }

    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }

    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    #[must_use]
    pub fn city(&self) -> &str {
        &self.city
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.country.is_empty()
            && self.state.is_empty()
            && self.city.is_empty()
            && self.category.is_empty()
            && self.min_rating.is_none()
    }

    #[must_use]
    pub fn matches(&self, record: &DirectoryRecord) -> bool {
        let name = self.name.to_lowercase();
        let category = self.category.to_lowercase();

        (name.is_empty() || record.name.to_lowercase().contains(&name))
            && exact(&self.country, record.location.country.as_deref())
            && exact(&self.state, record.location.state.as_deref())
            && exact(&self.city, record.location.city.as_deref())
            && (category.is_empty()
                || record
                    .categories
                    .iter()
                    .any(|value| value.to_lowercase() == category))
            && self.min_rating.map_or(true, |min| record.rating >= min)
    }
}

fn exact(selected: &str, value: Option<&str>) -> bool {
    selected.is_empty() || value == Some(selected)
}

#[must_use]
pub fn filter_records<'a>(
    records: &'a [DirectoryRecord],
    filter: &RecordFilter,
) -> Vec<&'a DirectoryRecord> {
    records.iter().filter(|record| filter.matches(record)).collect()
}

/// Options for the location and category selectors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Facets {
    pub countries: Vec<String>,
    /// Narrowed to the selected country.
    pub states: Vec<String>,
    /// Narrowed to the selected country and state.
    pub cities: Vec<String>,
    pub categories: Vec<String>,
}

impl Facets {
    #[must_use]
    pub fn collect(records: &[DirectoryRecord], filter: &RecordFilter) -> Self {
        let mut countries = BTreeSet::new();
        let mut states = BTreeSet::new();
        let mut cities = BTreeSet::new();
        let mut seen = HashSet::new();
        let mut categories = Vec::new();

        for record in records {
            let location = &record.location;
            if let Some(country) = &location.country {
                countries.insert(country.clone());
            }

            let in_country = exact(filter.country(), location.country.as_deref());
            if in_country {
                if let Some(state) = &location.state {
                    states.insert(state.clone());
                }
            }
            if in_country && exact(filter.state(), location.state.as_deref()) {
                if let Some(city) = &location.city {
                    cities.insert(city.clone());
                }
            }

            for category in &record.categories {
                if seen.insert(category.to_lowercase()) {
                    categories.push(category.clone());
                }
            }
        }

        categories.sort_by(|left, right| {
            left.to_lowercase()
                .cmp(&right.to_lowercase())
                .then_with(|| left.cmp(right))
        });

        Self {
            countries: countries.into_iter().collect(),
            states: states.into_iter().collect(),
            cities: cities.into_iter().collect(),
            categories,
        }
    }
}
