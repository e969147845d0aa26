use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use studio_cache_core::{
    now_millis, CacheEntry, CacheError, CacheOperation, CacheStats, JsonSerializer,
    PersistentStore, Serializer,
};

use super::circuit_breaker::{BreakerConfig, CircuitBreaker};
use crate::memory::MemoryTier;

/// Configuration for the tiered repository
#[derive(Debug, Clone)]
pub struct TierConfig {
    /// Maximum number of entries across the cache (0 = unlimited)
    pub max_entries: usize,
    /// Prefix owning every key this cache writes to the persistent store
    pub key_prefix: String,
    /// Persistent-tier breaker thresholds
    pub breaker: BreakerConfig,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            key_prefix: "studio_cache".to_string(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl TierConfig {
    /// Create config with a specific entry bound
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Default::default()
        }
    }
}

/// Outcome of a read against the in-process tier
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Fresh entry
    Hit(CacheEntry<Value>),
    /// No entry under the key
    Miss,
    /// Entry was found past its TTL and has been dropped
    Expired,
}

/// What a write did besides storing the entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Entries evicted to respect `max_entries`
    pub capacity_evicted: u64,
    /// Entries dropped to make room after a quota rejection
    pub quota_evicted: u64,
    /// Whether the entry reached the persistent tier
    pub persisted: bool,
}

/// Single entry repository over an in-process map and a persistent store
///
/// Every write goes to both tiers, reads are served from memory only, and
/// on open every persisted entry under the key prefix is loaded into memory.
/// Persistent-tier failures are logged, counted and otherwise ignored: the
/// repository keeps working memory-only.
pub struct TieredRepository<P, S = JsonSerializer> {
    memory: MemoryTier,
    store: Option<P>,
    serializer: S,
    breaker: CircuitBreaker,
    config: TierConfig,
    seq: AtomicU64,
    stats: RwLock<CacheStats>,
}

impl<P: PersistentStore> TieredRepository<P, JsonSerializer> {
    /// Open over a persistent store, loading what it holds
    pub async fn open(store: P, config: TierConfig) -> Self {
        Self::open_with_serializer(Some(store), JsonSerializer, config).await
    }

    /// Repository without a persistent tier
    pub fn memory_only(config: TierConfig) -> Self {
        Self::build(None, JsonSerializer, config)
    }
}

impl<P, S> TieredRepository<P, S>
where
    P: PersistentStore,
    S: Serializer,
{
    /// Open with a custom text format for persisted entries
    pub async fn open_with_serializer(store: Option<P>, serializer: S, config: TierConfig) -> Self {
        let repo = Self::build(store, serializer, config);
        repo.load().await;
        repo
    }

    fn build(store: Option<P>, serializer: S, config: TierConfig) -> Self {
        Self {
            memory: MemoryTier::new(),
            store,
            serializer,
            breaker: CircuitBreaker::new(config.breaker),
            config,
            seq: AtomicU64::new(1),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    fn scope_prefix(&self) -> String {
        format!("{}:", self.config.key_prefix)
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    /// Whether writes currently reach a persistent store
    pub fn persistence_active(&self) -> bool {
        self.store.is_some() && !self.breaker.is_open()
    }

    async fn load(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let keys = match store.keys_with_prefix(&self.scope_prefix()).await {
            Ok(keys) => {
                self.breaker.report_success();
                keys
            }
            Err(err) => {
                self.absorb(CacheOperation::Load, &err);
                return;
            }
        };

        let mut loaded = 0usize;
        let mut skipped = 0usize;
        for key in keys {
            let text = match store.get(&key).await {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(err) => {
                    self.absorb(CacheOperation::Load, &err);
                    skipped += 1;
                    continue;
                }
            };
            match self.serializer.deserialize::<CacheEntry<Value>>(&text) {
                Ok(entry) if entry.key == key => {
                    self.memory.insert(entry);
                    loaded += 1;
                }
                _ => {
                    debug!(target: "studio_cache", key = %key, "Skipping corrupt persisted entry");
                    self.persist_remove(&key).await;
                    skipped += 1;
                }
            }
        }

        self.seq.store(self.memory.max_seq() + 1, Ordering::Relaxed);
        let evicted = self.prune().await;
        info!(
            target: "studio_cache",
            loaded = loaded,
            skipped = skipped,
            evicted = evicted,
            "Loaded persisted cache entries"
        );
    }

    /// Read an entry, dropping it from both tiers if it has expired
    pub async fn get(&self, key: &str) -> Lookup {
        match self.memory.get(key) {
            None => {
                self.stats.write().misses += 1;
                Lookup::Miss
            }
            Some(entry) => {
                let now = now_millis();
                if !entry.is_expired_at(now) {
                    self.stats.write().hits += 1;
                    return Lookup::Hit(entry);
                }
                if self.memory.remove_if_expired(key, now) {
                    self.persist_remove(key).await;
                    self.stats.write().expirations += 1;
                }
                self.stats.write().misses += 1;
                Lookup::Expired
            }
        }
    }

    /// Store an entry in both tiers, then enforce the entry bound
    pub async fn put(&self, entry: CacheEntry<Value>) -> WriteReport {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let entry = entry.with_seq(seq);
        self.memory.insert(entry.clone());
        self.stats.write().writes += 1;

        let mut report = self.persist(&entry).await;
        report.capacity_evicted = self.prune().await;
        report
    }

    async fn persist(&self, entry: &CacheEntry<Value>) -> WriteReport {
        let mut report = WriteReport::default();
        let Some(store) = &self.store else {
            return report;
        };
        if !self.breaker.allow_request() {
            return report;
        }
        let text = match self.serializer.serialize(entry) {
            Ok(text) => text,
            Err(err) => {
                self.absorb(CacheOperation::Set, &err);
                return report;
            }
        };

        match store.set(&entry.key, text.clone()).await {
            Ok(()) => {
                self.breaker.report_success();
                report.persisted = true;
            }
            Err(CacheError::QuotaExceeded) => {
                report.quota_evicted = self.prune_for_quota(&entry.key).await;
                warn!(
                    target: "studio_cache",
                    key = %entry.key,
                    dropped = report.quota_evicted,
                    "Storage quota exceeded, pruned and retrying once"
                );
                match store.set(&entry.key, text).await {
                    Ok(()) => report.persisted = true,
                    Err(err) => self.absorb(CacheOperation::Set, &err),
                }
            }
            Err(err) => self.absorb(CacheOperation::Set, &err),
        }
        report
    }

    /// Drop the oldest half of the entries, never the one being written
    async fn prune_for_quota(&self, keep: &str) -> u64 {
        let count = (self.memory.len() / 2).max(1);
        let victims: Vec<String> = self
            .memory
            .oldest_keys(count + 1)
            .into_iter()
            .filter(|key| key != keep)
            .take(count)
            .collect();

        let mut dropped = 0;
        for key in victims {
            if self.memory.remove(&key).is_some() {
                dropped += 1;
            }
            self.persist_remove(&key).await;
        }
        self.stats.write().evictions += dropped;
        dropped
    }

    /// Evict oldest-written entries until the bound holds
    async fn prune(&self) -> u64 {
        let max = self.config.max_entries;
        if max == 0 || self.memory.len() <= max {
            return 0;
        }

        let excess = self.memory.len() - max;
        let mut evicted = 0;
        for key in self.memory.oldest_keys(excess) {
            if self.memory.remove(&key).is_some() {
                evicted += 1;
            }
            self.persist_remove(&key).await;
        }
        self.stats.write().evictions += evicted;
        evicted
    }

    /// Remove one entry from both tiers
    pub async fn remove(&self, key: &str) -> bool {
        let removed = self.memory.remove(key).is_some();
        self.persist_remove(key).await;
        if removed {
            self.stats.write().deletes += 1;
        }
        removed
    }

    /// Remove every entry matching `pred`, returning how many were removed
    pub async fn remove_where<F>(&self, pred: F) -> u64
    where
        F: Fn(&CacheEntry<Value>) -> bool,
    {
        let mut removed = 0;
        for key in self.memory.keys_where(pred) {
            if self.remove(&key).await {
                removed += 1;
            }
        }
        removed
    }

    /// Drop every expired entry now instead of on the next read
    pub async fn purge_expired(&self) -> u64 {
        let now = now_millis();
        let mut purged = 0;
        for key in self.memory.keys_where(|entry| entry.is_expired_at(now)) {
            if self.memory.remove_if_expired(&key, now) {
                self.persist_remove(&key).await;
                purged += 1;
            }
        }
        self.stats.write().expirations += purged;
        purged
    }

    /// Empty both tiers
    ///
    /// Only persisted keys under this cache's prefix are touched.
    pub async fn clear(&self) -> u64 {
        let cleared = self.memory.clear() as u64;
        if let Some(store) = &self.store {
            if self.breaker.allow_request() {
                match store.keys_with_prefix(&self.scope_prefix()).await {
                    Ok(keys) => {
                        self.breaker.report_success();
                        for key in keys {
                            self.persist_remove(&key).await;
                        }
                    }
                    Err(err) => self.absorb(CacheOperation::Invalidate, &err),
                }
            }
        }
        self.stats.write().deletes += cleared;
        cleared
    }

    async fn persist_remove(&self, key: &str) {
        let Some(store) = &self.store else {
            return;
        };
        if !self.breaker.allow_request() {
            return;
        }
        match store.remove(key).await {
            Ok(_) => self.breaker.report_success(),
            Err(err) => self.absorb(CacheOperation::Invalidate, &err),
        }
    }

    fn absorb(&self, operation: CacheOperation, err: &CacheError) {
        self.stats.write().persist_failures += 1;
        self.breaker.record(&Err(err));
        warn!(
            target: "studio_cache",
            operation = operation.as_str(),
            error = %err,
            "Persistent tier failure absorbed"
        );
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.size = self.memory.len();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::InMemoryStore;
    use std::time::Duration;

    fn entry(key: &str, data: i64) -> CacheEntry<Value> {
        CacheEntry::new(
            format!("studio_cache:{}", key),
            "acct",
            "ns",
            Value::from(data),
            Duration::from_secs(60),
        )
    }

    fn config(max_entries: usize) -> TierConfig {
        TierConfig::with_max_entries(max_entries)
    }

    #[tokio::test]
    async fn test_write_through() {
        let store = InMemoryStore::new();
        let repo = TieredRepository::open(store.clone(), config(10)).await;

        let report = repo.put(entry("a", 1)).await;
        assert!(report.persisted);
        assert_eq!(store.len(), 1);
        assert!(matches!(repo.get("studio_cache:a").await, Lookup::Hit(_)));
    }

    #[tokio::test]
    async fn test_reopen_loads_entries() {
        let store = InMemoryStore::new();
        {
            let repo = TieredRepository::open(store.clone(), config(10)).await;
            repo.put(entry("a", 1)).await;
            repo.put(entry("b", 2)).await;
        }

        let reopened = TieredRepository::open(store, config(10)).await;
        assert_eq!(reopened.len(), 2);
        match reopened.get("studio_cache:b").await {
            Lookup::Hit(e) => assert_eq!(e.data, Value::from(2)),
            other => panic!("expected hit, got {:?}", other),
        }

        // Sequence continues after the highest loaded one
        reopened.put(entry("c", 3)).await;
        let seq_of = |lookup: Lookup| match lookup {
            Lookup::Hit(e) => e.seq,
            other => panic!("expected hit, got {:?}", other),
        };
        let b = seq_of(reopened.get("studio_cache:b").await);
        let c = seq_of(reopened.get("studio_cache:c").await);
        assert!(c > b);
    }

    #[tokio::test]
    async fn test_corrupt_entries_skipped_on_load() {
        let store = InMemoryStore::new();
        store.insert_raw("studio_cache:broken", "{not json");
        store.insert_raw("unrelated", "left alone");
        {
            let repo = TieredRepository::open(store.clone(), config(10)).await;
            repo.put(entry("good", 1)).await;
        }

        let repo = TieredRepository::open(store.clone(), config(10)).await;
        assert_eq!(repo.len(), 1);
        assert!(store.get("studio_cache:broken").await.unwrap().is_none());
        assert!(store.get("unrelated").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_capacity_keeps_newest() {
        let store = InMemoryStore::new();
        let repo = TieredRepository::open(store.clone(), config(3)).await;

        for i in 0..5 {
            repo.put(entry(&format!("k{}", i), i)).await;
        }

        assert_eq!(repo.len(), 3);
        assert_eq!(store.len(), 3);
        for i in 0..2 {
            assert_eq!(repo.get(&format!("studio_cache:k{}", i)).await, Lookup::Miss);
        }
        for i in 2..5 {
            assert!(matches!(repo.get(&format!("studio_cache:k{}", i)).await, Lookup::Hit(_)));
        }
        assert_eq!(repo.stats().evictions, 2);
    }

    #[tokio::test]
    async fn test_quota_prunes_and_retries() {
        // Every entry below serializes to the same length
        let sample = serde_json::to_string(&entry("k0", 0).with_seq(1)).unwrap();
        let per_entry = sample.len() + "studio_cache:k0".len();
        let store = InMemoryStore::with_quota(per_entry * 4 + per_entry / 2);

        let repo = TieredRepository::open(store, config(100)).await;
        for i in 0..4 {
            assert!(repo.put(entry(&format!("k{}", i), i)).await.persisted);
        }

        let report = repo.put(entry("k4", 4)).await;
        assert!(report.persisted);
        assert_eq!(report.quota_evicted, 2);
        assert_eq!(repo.len(), 3);
        assert!(matches!(repo.get("studio_cache:k4").await, Lookup::Hit(_)));
        assert_eq!(repo.get("studio_cache:k0").await, Lookup::Miss);
    }

    #[tokio::test]
    async fn test_quota_gives_up_silently() {
        let store = InMemoryStore::with_quota(1);
        let repo = TieredRepository::open(store.clone(), config(10)).await;

        let report = repo.put(entry("big", 1)).await;
        assert!(!report.persisted);
        assert!(store.is_empty());
        assert!(matches!(repo.get("studio_cache:big").await, Lookup::Hit(_)));
        assert_eq!(repo.stats().persist_failures, 1);
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_to_memory() {
        let store = InMemoryStore::unavailable();
        let repo = TieredRepository::open(store, config(10)).await;

        repo.put(entry("a", 1)).await;
        repo.put(entry("b", 2)).await;
        assert!(matches!(repo.get("studio_cache:a").await, Lookup::Hit(_)));
        assert!(repo.remove("studio_cache:a").await);
        assert!(!repo.persistence_active());
        assert!(repo.stats().persist_failures >= 1);
    }

    #[tokio::test]
    async fn test_expired_entry_removed_on_read() {
        let store = InMemoryStore::new();
        let repo = TieredRepository::open(store.clone(), config(10)).await;

        let mut stale = entry("old", 1);
        stale.ttl = 0;
        stale.timestamp = now_millis() - 10;
        repo.put(stale).await;
        assert_eq!(store.len(), 1);

        assert_eq!(repo.get("studio_cache:old").await, Lookup::Expired);
        assert_eq!(repo.get("studio_cache:old").await, Lookup::Miss);
        assert!(store.is_empty());
        assert_eq!(repo.stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let repo: TieredRepository<InMemoryStore> = TieredRepository::memory_only(config(10));

        let mut stale = entry("old", 1);
        stale.ttl = 0;
        stale.timestamp = now_millis() - 10;
        repo.put(stale).await;
        repo.put(entry("fresh", 2)).await;

        assert_eq!(repo.purge_expired().await, 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_only_touches_own_prefix() {
        let store = InMemoryStore::new();
        store.insert_raw("foreign", "x");
        let repo = TieredRepository::open(store.clone(), config(10)).await;
        repo.put(entry("a", 1)).await;
        repo.put(entry("b", 2)).await;

        assert_eq!(repo.clear().await, 2);
        assert!(repo.is_empty());
        assert_eq!(store.keys().await.unwrap(), vec!["foreign"]);
    }

    #[tokio::test]
    async fn test_remove_where() {
        let repo: TieredRepository<InMemoryStore> = TieredRepository::memory_only(config(10));
        repo.put(entry("a", 1)).await;
        repo.put(entry("b", 2)).await;
        repo.put(entry("c", 3)).await;

        let removed = repo.remove_where(|e| e.data.as_i64().unwrap_or(0) >= 2).await;
        assert_eq!(removed, 2);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.stats().deletes, 2);
    }
}
