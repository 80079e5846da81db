//! Data-loading boundary between the gate and the directory store.

use std::sync::Arc;
use tracing::{error, warn};

use super::{
    backfill::PhotoBackfill,
    record::{normalize_records, DirectoryRecord},
};
use crate::{
    gate::{messages, AuthGate, GateError},
    store::{Collection, DirectoryStore, StoreError},
};

pub const STORE_NOT_CONFIGURED: &str = "Directory store is not configured.";

/// A failed directory read, as both the gate and the HTTP surface report it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadFailure {
    /// The store denied the read. Ends the session instead of retrying.
    Denied,
    /// Any other failure; the message is safe to show.
    Unavailable(String),
}

impl LoadFailure {
    /// Classifies and logs a store error for `collection`.
    #[must_use]
    pub fn from_store(collection: &Collection, err: &StoreError) -> Self {
        match err {
            StoreError::PermissionDenied => {
                warn!(collection = collection.name(), "directory read denied");
                Self::Denied
            }
            StoreError::NotConfigured => Self::Unavailable(STORE_NOT_CONFIGURED.to_string()),
            StoreError::Backend(_) => {
                error!(error = %err, collection = collection.name(), "failed to load directory");
                Self::Unavailable(format!("Failed to load {}.", collection.name()))
            }
        }
    }
}

pub struct DirectoryLoader {
    store: Arc<dyn DirectoryStore>,
    backfill: Option<Arc<PhotoBackfill>>,
}

impl DirectoryLoader {
    #[must_use]
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self {
            store,
            backfill: None,
        }
    }

    /// Schedule a photo backfill after each successful load.
    #[must_use]
    pub fn with_backfill(mut self, backfill: Arc<PhotoBackfill>) -> Self {
        self.backfill = Some(backfill);
        self
    }

    /// Loads and normalizes a collection for a tab that has access.
    ///
    /// A permission error ends the gate session instead of being retried.
    ///
    /// # Errors
    /// Returns a [`GateError`] carrying the message to show.
    pub async fn load(
        &self,
        gate: &mut AuthGate,
        collection: &Collection,
    ) -> Result<Vec<DirectoryRecord>, GateError> {
        if !gate.has_access() {
            return Err(GateError::authorization(messages::SIGN_IN_REQUIRED));
        }

        match self.store.list(collection).await {
            Ok(raw) => {
                let records = normalize_records(collection, &raw);
                if let Some(backfill) = &self.backfill {
                    // Detached; failures are logged by the backfill itself.
                    drop(backfill.schedule(collection.clone(), records.clone()));
                }
                Ok(records)
            }
            Err(err) => match LoadFailure::from_store(collection, &err) {
                LoadFailure::Denied => {
                    gate.report_permission_denied().await;
                    Err(GateError::Permission(messages::ACCESS_REVOKED.to_string()))
                }
                LoadFailure::Unavailable(message) => Err(GateError::Transport(message)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_share_one_mapping() {
        let employees = Collection::Employees {
            install_id: "install-1".to_string(),
        };
        assert_eq!(
            LoadFailure::from_store(&employees, &StoreError::PermissionDenied),
            LoadFailure::Denied
        );
        assert_eq!(
            LoadFailure::from_store(&employees, &StoreError::NotConfigured),
            LoadFailure::Unavailable(STORE_NOT_CONFIGURED.to_string())
        );
        assert_eq!(
            LoadFailure::from_store(
                &Collection::Restaurants,
                &StoreError::Backend("reset".to_string())
            ),
            LoadFailure::Unavailable("Failed to load restaurants.".to_string())
        );
    }
}
