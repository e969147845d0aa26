//! Persistent key-value store trait

use async_trait::async_trait;

use crate::CacheError;

/// String-keyed persistent storage used as the durable cache tier
///
/// The contract matches a browser-style local storage: plain string values,
/// a capacity limit that may reject writes, and no reliability guarantees.
/// Callers must be prepared for any operation to fail.
#[async_trait]
pub trait PersistentStore: Send + Sync + 'static {
    /// Read a value
    ///
    /// Returns `None` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a value, replacing any previous one
    ///
    /// Fails with `CacheError::QuotaExceeded` when the store is full.
    async fn set(&self, key: &str, value: String) -> Result<(), CacheError>;

    /// Remove a key
    ///
    /// Returns `true` if the key existed.
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Enumerate every key currently stored
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Enumerate keys starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        Ok(self
            .keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}
