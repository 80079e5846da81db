//! Persists the canonical fallback photo for flagged records.
//!
//! Each record is updated at most once per process unless its update failed,
//! in which case the next pass retries it.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error};

use super::record::DirectoryRecord;
use crate::store::{Collection, DirectoryStore, StoreError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub scheduled: usize,
    pub failed: usize,
}

pub struct PhotoBackfill {
    store: Arc<dyn DirectoryStore>,
    updated: Mutex<HashSet<(Collection, String)>>,
}

impl PhotoBackfill {
    #[must_use]
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self {
            store,
            updated: Mutex::new(HashSet::new()),
        }
    }

    /// Claims every record still needing an update and returns `(id, photo)`
    /// pairs. Claimed ids are skipped by later calls.
    fn claim(&self, collection: &Collection, records: &[DirectoryRecord]) -> Vec<(String, &'static str)> {
        let Ok(mut updated) = self.updated.lock() else {
            error!("photo backfill state poisoned");
            return Vec::new();
        };
        records
            .iter()
            .filter_map(|record| {
                let photo = record.needs_photo_backfill()?;
                updated
                    .insert((collection.clone(), record.id.clone()))
                    .then(|| (record.id.clone(), photo))
            })
            .collect()
    }

    fn release(&self, collection: &Collection, id: &str) {
        if let Ok(mut updated) = self.updated.lock() {
            updated.remove(&(collection.clone(), id.to_string()));
        }
    }

    /// Runs one backfill pass and waits for its updates.
    pub async fn run(&self, collection: &Collection, records: &[DirectoryRecord]) -> BackfillReport {
        let pending = self.claim(collection, records);
        let mut report = BackfillReport {
            scheduled: pending.len(),
            failed: 0,
        };
        if pending.is_empty() {
            return report;
        }

        let mut outstanding: HashSet<String> =
            pending.iter().map(|(id, _)| id.clone()).collect();
        let mut updates = JoinSet::new();
        for (id, photo) in pending {
            let store = Arc::clone(&self.store);
            let collection = collection.clone();
            updates.spawn(async move {
                let result: Result<(), StoreError> =
                    store.update_photo(&collection, &id, photo).await;
                (id, result)
            });
        }

        while let Some(joined) = updates.join_next().await {
            match joined {
                Ok((id, Ok(()))) => {
                    outstanding.remove(&id);
                    debug!(id, collection = collection.name(), "photo backfilled");
                }
                Ok((id, Err(err))) => {
                    outstanding.remove(&id);
                    error!(error = %err, id, collection = collection.name(), "failed to update photo");
                    self.release(collection, &id);
                    report.failed += 1;
                }
                Err(err) => {
                    error!(error = %err, "photo update task failed");
                    report.failed += 1;
                }
            }
        }

        // Ids whose task never reported back (panicked or cancelled).
        for id in outstanding {
            self.release(collection, &id);
        }
        report
    }

    /// Background pass; the caller may ignore the handle.
    pub fn schedule(
        self: &Arc<Self>,
        collection: Collection,
        records: Vec<DirectoryRecord>,
    ) -> JoinHandle<BackfillReport> {
        let backfill = Arc::clone(self);
        tokio::spawn(async move { backfill.run(&collection, &records).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryDirectoryStore, RawRecord};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Panics on the first photo update, then delegates.
    struct PanicOnceStore {
        inner: Arc<MemoryDirectoryStore>,
        panicked: AtomicBool,
    }

    #[async_trait]
    impl DirectoryStore for PanicOnceStore {
        async fn list(&self, collection: &Collection) -> Result<Vec<RawRecord>, StoreError> {
            self.inner.list(collection).await
        }

        async fn update_photo(
            &self,
            collection: &Collection,
            id: &str,
            photo: &str,
        ) -> Result<(), StoreError> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("store crashed while updating {id}");
            }
            self.inner.update_photo(collection, id, photo).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    fn seeded() -> Result<(Arc<MemoryDirectoryStore>, Vec<DirectoryRecord>), StoreError> {
        let store = Arc::new(MemoryDirectoryStore::new());
        let raw = vec![
            RawRecord::new("a", json!({"fallbackApplied": true, "category": "Cafes", "photo": "x.png"})),
            RawRecord::new("b", json!({"fallbackApplied": true, "categories": ["Cafes", "Sandwiches"]})),
            RawRecord::new("c", json!({"fallbackApplied": true, "category": "Cafes", "photo": "/fallbackcafe.png"})),
            RawRecord::new("d", json!({"category": "Cafes", "photo": "x.png"})),
        ];
        store.insert(Collection::Restaurants, raw.clone())?;
        let records = raw
            .iter()
            .map(|record| DirectoryRecord::from_raw(&Collection::Restaurants, record))
            .collect();
        Ok((store, records))
    }

    #[tokio::test]
    async fn updates_each_pending_record_once() -> Result<(), StoreError> {
        let (store, records) = seeded()?;
        let backfill = PhotoBackfill::new(store.clone());

        let report = backfill.run(&Collection::Restaurants, &records).await;
        assert_eq!(report, BackfillReport { scheduled: 2, failed: 0 });
        let mut updates = store.updates();
        updates.sort();
        assert_eq!(
            updates,
            vec![
                ("a".to_string(), "/fallbackcafe.png".to_string()),
                ("b".to_string(), "/fallbacksandwich.png".to_string()),
            ]
        );

        // Same stale snapshot again: already claimed, nothing to do.
        let report = backfill.run(&Collection::Restaurants, &records).await;
        assert_eq!(report.scheduled, 0);
        assert_eq!(store.updates().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn failed_updates_are_retried_next_pass() -> Result<(), StoreError> {
        let (store, records) = seeded()?;
        let backfill = Arc::new(PhotoBackfill::new(store.clone()));
        store.fail_updates(Some(StoreError::Backend("offline".to_string())))?;

        let report = backfill.run(&Collection::Restaurants, &records).await;
        assert_eq!(report, BackfillReport { scheduled: 2, failed: 2 });

        store.fail_updates(None)?;
        let report = backfill
            .schedule(Collection::Restaurants, records)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        assert_eq!(report, BackfillReport { scheduled: 2, failed: 0 });
        Ok(())
    }

    #[tokio::test]
    async fn panicked_update_is_retried_next_pass() -> Result<(), StoreError> {
        let (inner, records) = seeded()?;
        let records: Vec<DirectoryRecord> = records
            .into_iter()
            .filter(|record| record.id == "a")
            .collect();
        let store = Arc::new(PanicOnceStore {
            inner: inner.clone(),
            panicked: AtomicBool::new(false),
        });
        let backfill = PhotoBackfill::new(store);

        let report = backfill.run(&Collection::Restaurants, &records).await;
        assert_eq!(report, BackfillReport { scheduled: 1, failed: 1 });
        assert!(inner.updates().is_empty());

        let report = backfill.run(&Collection::Restaurants, &records).await;
        assert_eq!(report, BackfillReport { scheduled: 1, failed: 0 });
        assert_eq!(
            inner.updates(),
            vec![("a".to_string(), "/fallbackcafe.png".to_string())]
        );
        Ok(())
    }
}
