//! External document stores: block list, login audit, and directory collections.
//!
//! Production code uses the Postgres implementations; the in-memory ones back
//! tests and local runs. All writes that need a timestamp leave it to the store
//! (server time), so records built by the gate carry no clock reading.

mod memory;
mod postgres;

pub use memory::{MemoryBlockList, MemoryDirectoryStore, MemoryLoginAudit};
pub use postgres::{ensure_schema, PgStore, SCHEMA_SQL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::identity::UserIdentity;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("missing or insufficient permissions")]
    PermissionDenied,
    #[error("document store is not configured")]
    NotConfigured,
    #[error("document store error: {0}")]
    Backend(String),
}

/// Permanent denial marker keyed by uid. Only an external removal lifts it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub uid: String,
    pub display_name: String,
    pub email: String,
    pub reason: String,
    /// Assigned by the store on write.
    pub blocked_at_unix: Option<i64>,
}

impl BlockRecord {
    #[must_use]
    pub fn for_identity(identity: &UserIdentity, reason: &str) -> Self {
        Self {
            uid: identity.uid.clone(),
            display_name: identity.display_name.clone(),
            email: identity.email.clone(),
            reason: reason.to_string(),
            blocked_at_unix: None,
        }
    }
}

/// Append-only login audit row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginEntry {
    pub uid: String,
    pub display_name: String,
    pub email: String,
}

impl From<&UserIdentity> for LoginEntry {
    fn from(identity: &UserIdentity) -> Self {
        Self {
            uid: identity.uid.clone(),
            display_name: identity.display_name.clone(),
            email: identity.email.clone(),
        }
    }
}

/// Directory collections. Employees are scoped by a per-install identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Restaurants,
    Employees { install_id: String },
}

impl Collection {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Restaurants => "restaurants",
            Self::Employees { .. } => "employees",
        }
    }

    /// Scope within the collection; empty for unscoped collections.
    #[must_use]
    pub fn scope(&self) -> &str {
        match self {
            Self::Restaurants => "",
            Self::Employees { install_id } => install_id,
        }
    }
}

/// Raw directory document as stored, with whatever field aliases it carries.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl RawRecord {
    /// Builds a record from a JSON object; non-object values yield no fields.
    #[must_use]
    pub fn new(id: &str, document: Value) -> Self {
        let fields = match document {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        Self {
            id: id.to_string(),
            fields,
        }
    }
}

#[async_trait]
pub trait BlockList: Send + Sync {
    /// Existence check only.
    async fn is_blocked(&self, uid: &str) -> Result<bool, StoreError>;

    async fn block(&self, record: &BlockRecord) -> Result<(), StoreError>;
}

#[async_trait]
pub trait LoginAudit: Send + Sync {
    async fn record_login(&self, entry: &LoginEntry) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn list(&self, collection: &Collection) -> Result<Vec<RawRecord>, StoreError>;

    /// Persists a new `photo` value on one document.
    async fn update_photo(
        &self,
        collection: &Collection,
        id: &str,
        photo: &str,
    ) -> Result<(), StoreError>;

    /// Liveness check used by `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}
