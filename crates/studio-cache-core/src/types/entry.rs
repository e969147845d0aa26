//! Cache entry type

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A cached query result with its scoping metadata
///
/// Entries are immutable once stored: a write to the same key replaces
/// the whole entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The cached payload
    pub data: T,
    /// Creation time in epoch millis
    pub timestamp: u64,
    /// Validity duration in millis
    pub ttl: u64,
    /// Tenant the entry belongs to
    pub account_id: String,
    /// Logical query the entry belongs to
    pub namespace: String,
    /// Fully-qualified cache key
    pub key: String,
    /// Write sequence, orders entries created in the same millisecond
    #[serde(default)]
    pub seq: u64,
}

impl<T> CacheEntry<T> {
    /// Create an entry stamped with the current time
    pub fn new(
        key: impl Into<String>,
        account_id: impl Into<String>,
        namespace: impl Into<String>,
        data: T,
        ttl: Duration,
    ) -> Self {
        Self {
            data,
            timestamp: now_millis(),
            ttl: ttl.as_millis() as u64,
            account_id: account_id.into(),
            namespace: namespace.into(),
            key: key.into(),
            seq: 0,
        }
    }

    /// Set the write sequence
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Check expiry against an explicit clock reading
    pub fn is_expired_at(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > self.ttl
    }

    /// Check if entry has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Get remaining TTL, `None` once expired
    pub fn ttl_remaining(&self) -> Option<Duration> {
        let age = now_millis().saturating_sub(self.timestamp);
        self.ttl.checked_sub(age).map(Duration::from_millis)
    }

    /// Get age of the entry
    pub fn age(&self) -> Duration {
        Duration::from_millis(now_millis().saturating_sub(self.timestamp))
    }

    /// Write-order key used by eviction: oldest sorts first
    pub fn write_order(&self) -> (u64, u64) {
        (self.timestamp, self.seq)
    }

    /// Replace the payload, keeping all metadata
    pub fn map<U, F>(self, f: F) -> CacheEntry<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheEntry {
            data: f(self.data),
            timestamp: self.timestamp,
            ttl: self.ttl,
            account_id: self.account_id,
            namespace: self.namespace,
            key: self.key,
            seq: self.seq,
        }
    }
}
