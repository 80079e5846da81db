//! Cross-tab persistent storage for the session token.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::token::SessionToken;

/// Fixed storage key for the session token.
pub const SESSION_TOKEN_KEY: &str = "dirgate_session_token";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("session storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistent, cross-tab-visible token storage.
///
/// Failures are reported but callers treat storage as best-effort.
pub trait SessionStore: Send + Sync {
    /// # Errors
    /// Returns an error if the storage cannot be read.
    fn read(&self) -> Result<Option<SessionToken>, StorageError>;

    /// # Errors
    /// Returns an error if the storage cannot be written.
    fn write(&self, token: &SessionToken) -> Result<(), StorageError>;

    /// Removes the token and reports whether one was present.
    ///
    /// # Errors
    /// Returns an error if the storage cannot be written.
    fn clear(&self) -> Result<bool, StorageError>;
}

/// Shared in-memory storage; clones see the same entries, like tabs of one
/// browser profile.
#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn read(&self) -> Result<Option<SessionToken>, StorageError> {
        let entries = self.lock()?;
        Ok(entries
            .get(SESSION_TOKEN_KEY)
            .and_then(|value| SessionToken::from_stored(value)))
    }

    fn write(&self, token: &SessionToken) -> Result<(), StorageError> {
        let mut entries = self.lock()?;
        entries.insert(SESSION_TOKEN_KEY.to_string(), token.expose().to_string());
        Ok(())
    }

    fn clear(&self) -> Result<bool, StorageError> {
        let mut entries = self.lock()?;
        Ok(entries.remove(SESSION_TOKEN_KEY).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn write_read_clear() -> Result<()> {
        let store = MemorySessionStore::new();
        assert!(store.read()?.is_none());

        let token = SessionToken::mint()?;
        store.write(&token)?;
        let stored = store.read()?;
        assert!(stored.is_some_and(|stored| stored.matches(&token)));

        assert!(store.clear()?);
        assert!(!store.clear()?);
        assert!(store.read()?.is_none());
        Ok(())
    }

    #[test]
    fn clones_share_entries() -> Result<()> {
        let first_tab = MemorySessionStore::new();
        let second_tab = first_tab.clone();
        second_tab.write(&SessionToken::mint()?)?;
        assert!(first_tab.read()?.is_some());
        assert!(first_tab.clear()?);
        assert!(second_tab.read()?.is_none());
        Ok(())
    }
}
