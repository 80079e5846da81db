//! In-memory stores with failure injection, used by tests and local runs.

use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use super::{
    BlockList, BlockRecord, Collection, DirectoryStore, LoginAudit, LoginEntry, RawRecord,
    StoreError,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
}

fn injected(slot: &Mutex<Option<StoreError>>) -> Result<(), StoreError> {
    match lock(slot)?.clone() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

#[derive(Debug, Default)]
pub struct MemoryBlockList {
    records: Mutex<HashMap<String, BlockRecord>>,
    lookup_error: Mutex<Option<StoreError>>,
    write_error: Mutex<Option<StoreError>>,
    writes: Mutex<usize>,
}

impl MemoryBlockList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record as an administrator would, outside the gate.
    ///
    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn insert(&self, record: BlockRecord) -> Result<(), StoreError> {
        lock(&self.records)?.insert(record.uid.clone(), record);
        Ok(())
    }

    /// External unblock.
    ///
    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn remove(&self, uid: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.records)?.remove(uid).is_some())
    }

    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn get(&self, uid: &str) -> Result<Option<BlockRecord>, StoreError> {
        Ok(lock(&self.records)?.get(uid).cloned())
    }

    /// Number of `block` calls that reached the store, failed or not.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        lock(&self.writes).map_or(0, |writes| *writes)
    }

    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn fail_lookups(&self, error: Option<StoreError>) -> Result<(), StoreError> {
        *lock(&self.lookup_error)? = error;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn fail_writes(&self, error: Option<StoreError>) -> Result<(), StoreError> {
        *lock(&self.write_error)? = error;
        Ok(())
    }
}

#[async_trait]
impl BlockList for MemoryBlockList {
    async fn is_blocked(&self, uid: &str) -> Result<bool, StoreError> {
        injected(&self.lookup_error)?;
        Ok(lock(&self.records)?.contains_key(uid))
    }

    async fn block(&self, record: &BlockRecord) -> Result<(), StoreError> {
        *lock(&self.writes)? += 1;
        injected(&self.write_error)?;
        let mut stored = record.clone();
        stored.blocked_at_unix = Some(now_unix());
        lock(&self.records)?.insert(stored.uid.clone(), stored);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryLoginAudit {
    entries: Mutex<Vec<LoginEntry>>,
    error: Mutex<Option<StoreError>>,
}

impl MemoryLoginAudit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<LoginEntry> {
        lock(&self.entries).map_or_else(|_| Vec::new(), |entries| entries.clone())
    }

    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn fail_with(&self, error: Option<StoreError>) -> Result<(), StoreError> {
        *lock(&self.error)? = error;
        Ok(())
    }
}

#[async_trait]
impl LoginAudit for MemoryLoginAudit {
    async fn record_login(&self, entry: &LoginEntry) -> Result<(), StoreError> {
        injected(&self.error)?;
        lock(&self.entries)?.push(entry.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryDirectoryStore {
    collections: Mutex<HashMap<Collection, Vec<RawRecord>>>,
    list_error: Mutex<Option<StoreError>>,
    update_error: Mutex<Option<StoreError>>,
    updates: Mutex<Vec<(String, String)>>,
}

impl MemoryDirectoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn insert(&self, collection: Collection, records: Vec<RawRecord>) -> Result<(), StoreError> {
        lock(&self.collections)?
            .entry(collection)
            .or_default()
            .extend(records);
        Ok(())
    }

    /// `(id, photo)` pairs in the order `update_photo` received them.
    #[must_use]
    pub fn updates(&self) -> Vec<(String, String)> {
        lock(&self.updates).map_or_else(|_| Vec::new(), |updates| updates.clone())
    }

    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn fail_lists(&self, error: Option<StoreError>) -> Result<(), StoreError> {
        *lock(&self.list_error)? = error;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the store lock is poisoned.
    pub fn fail_updates(&self, error: Option<StoreError>) -> Result<(), StoreError> {
        *lock(&self.update_error)? = error;
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn list(&self, collection: &Collection) -> Result<Vec<RawRecord>, StoreError> {
        injected(&self.list_error)?;
        Ok(lock(&self.collections)?
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_photo(
        &self,
        collection: &Collection,
        id: &str,
        photo: &str,
    ) -> Result<(), StoreError> {
        lock(&self.updates)?.push((id.to_string(), photo.to_string()));
        injected(&self.update_error)?;
        let mut collections = lock(&self.collections)?;
        let record = collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|record| record.id == id))
            .ok_or_else(|| StoreError::Backend(format!("no document {id}")))?;
        record
            .fields
            .insert("photo".to_string(), Value::String(photo.to_string()));
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn block_list_assigns_timestamp() -> Result<(), StoreError> {
        let store = MemoryBlockList::new();
        let record = BlockRecord {
            uid: "uid-1".to_string(),
            display_name: "Owner".to_string(),
            email: "owner@example.com".to_string(),
            reason: "test".to_string(),
            blocked_at_unix: None,
        };
        assert!(!store.is_blocked("uid-1").await?);
        store.block(&record).await?;
        assert!(store.is_blocked("uid-1").await?);
        assert!(store.get("uid-1")?.and_then(|r| r.blocked_at_unix).is_some());
        assert_eq!(store.write_attempts(), 1);
        assert!(store.remove("uid-1")?);
        assert!(!store.is_blocked("uid-1").await?);
        Ok(())
    }

    #[tokio::test]
    async fn injected_lookup_failure() -> Result<(), StoreError> {
        let store = MemoryBlockList::new();
        store.fail_lookups(Some(StoreError::Backend("offline".to_string())))?;
        assert!(store.is_blocked("uid-1").await.is_err());
        store.fail_lookups(None)?;
        assert!(!store.is_blocked("uid-1").await?);
        Ok(())
    }

    #[tokio::test]
    async fn directory_update_rewrites_photo() -> Result<(), StoreError> {
        let store = MemoryDirectoryStore::new();
        store.insert(
            Collection::Restaurants,
            vec![RawRecord::new("r1", json!({"name": "Deli", "photo": "old.png"}))],
        )?;
        store
            .update_photo(&Collection::Restaurants, "r1", "/fallbacksandwich.png")
            .await?;
        let records = store.list(&Collection::Restaurants).await?;
        assert_eq!(
            records[0].fields.get("photo"),
            Some(&json!("/fallbacksandwich.png"))
        );
        assert_eq!(
            store.updates(),
            vec![("r1".to_string(), "/fallbacksandwich.png".to_string())]
        );
        Ok(())
    }

    #[tokio::test]
    async fn scoped_collections_are_isolated() -> Result<(), StoreError> {
        let store = MemoryDirectoryStore::new();
        let first = Collection::Employees {
            install_id: "a".to_string(),
        };
        let second = Collection::Employees {
            install_id: "b".to_string(),
        };
        store.insert(first.clone(), vec![RawRecord::new("e1", json!({}))])?;
        assert_eq!(store.list(&first).await?.len(), 1);
        assert!(store.list(&second).await?.is_empty());
        Ok(())
    }
}
