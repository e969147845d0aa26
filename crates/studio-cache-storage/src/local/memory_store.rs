//! Quota-bounded store kept in process memory

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use studio_cache_core::{CacheError, PersistentStore, Result};

/// In-memory `PersistentStore` with an optional byte quota
///
/// Behaves like browser local storage: writes past the quota are rejected
/// and the whole store can be switched off. Cloning creates a new handle to
/// the SAME underlying data, which lets a test drop a cache and reopen it
/// over the same "disk".
#[derive(Clone, Default)]
pub struct InMemoryStore {
    data: Arc<DashMap<String, String>>,
    quota_bytes: Option<usize>,
    disabled: Arc<RwLock<bool>>,
    /// Serializes writers so the quota check and the insert are one step
    write_lock: Arc<Mutex<()>>,
}

impl InMemoryStore {
    /// Unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once keys plus values exceed `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Default::default()
        }
    }

    /// Store on which every operation fails, as with disabled storage
    pub fn unavailable() -> Self {
        let store = Self::new();
        store.set_available(false);
        store
    }

    /// Switch the store on or off
    pub fn set_available(&self, available: bool) {
        *self.disabled.write() = !available;
    }

    /// Bytes currently used by keys and values
    pub fn used_bytes(&self) -> usize {
        self.data
            .iter()
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }

    /// Write a raw value without quota checks (used to plant corrupt data)
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if *self.disabled.read() {
            Err(CacheError::Unavailable("storage disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.check_available()?;
        let _guard = self.write_lock.lock();
        if let Some(quota) = self.quota_bytes {
            let previous = self
                .data
                .get(key)
                .map(|v| key.len() + v.value().len())
                .unwrap_or(0);
            let projected = self.used_bytes().saturating_sub(previous) + key.len() + value.len();
            if projected > quota {
                return Err(CacheError::QuotaExceeded);
            }
        }
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.data.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self.data.iter().map(|entry| entry.key().clone()).collect())
    }
}
