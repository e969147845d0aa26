//! High-level query cache

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use studio_cache_core::{
    CacheEntry, CacheError, CacheMetrics, CacheOperation, CacheOptions, CacheStats, CacheTier,
    EvictionReason, JsonSerializer, NoopMetrics, Params, PersistentStore, QueryKey, Result,
};
use studio_cache_storage::{
    BreakerConfig, InMemoryStore, Lookup, TierConfig, TieredRepository, WriteReport,
};

mod groups;
pub use groups::NamespaceCache;

/// Configuration for QueryCache
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    /// TTL for entries written without an explicit one
    pub default_ttl: Duration,
    /// Maximum number of entries (0 = unlimited)
    pub max_entries: usize,
    /// Prefix of every key, persisted or not
    pub key_prefix: String,
    /// Persistent-tier breaker thresholds
    pub breaker: BreakerConfig,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(5 * 60),
            max_entries: 100,
            key_prefix: "studio_cache".to_string(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl QueryCacheConfig {
    /// Create config with specific default TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            default_ttl: ttl,
            ..Default::default()
        }
    }

    /// Create config with a specific entry bound
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Default::default()
        }
    }

    /// Use a different key prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn tier_config(&self) -> TierConfig {
        TierConfig {
            max_entries: self.max_entries,
            key_prefix: self.key_prefix.clone(),
            breaker: self.breaker,
        }
    }
}

/// Account-scoped read-through cache for remote query results
///
/// Construct once at startup and share it by cloning (clones share the
/// same entries). Generic over:
/// - `P`: the persistent store backing the durable tier
/// - `M`: the metrics collector
pub struct QueryCache<P = InMemoryStore, M = NoopMetrics>
where
    P: PersistentStore,
    M: CacheMetrics,
{
    repo: Arc<TieredRepository<P>>,
    metrics: Arc<M>,
    config: QueryCacheConfig,
}

impl<P: PersistentStore> QueryCache<P, NoopMetrics> {
    /// Open a cache over `store`, loading the entries it already holds
    pub async fn open(store: P, config: QueryCacheConfig) -> Self {
        Self::open_with_metrics(Some(store), NoopMetrics, config).await
    }
}

impl QueryCache<InMemoryStore, NoopMetrics> {
    /// Cache without a persistent tier
    pub fn memory_only(config: QueryCacheConfig) -> Self {
        Self {
            repo: Arc::new(TieredRepository::memory_only(config.tier_config())),
            metrics: Arc::new(NoopMetrics),
            config,
        }
    }
}

impl<P, M> QueryCache<P, M>
where
    P: PersistentStore,
    M: CacheMetrics,
{
    /// Open with a custom metrics collector
    pub async fn open_with_metrics(store: Option<P>, metrics: M, config: QueryCacheConfig) -> Self {
        let start = Instant::now();
        let repo =
            TieredRepository::open_with_serializer(store, JsonSerializer, config.tier_config())
                .await;
        metrics.record_latency(CacheOperation::Load, start.elapsed());
        metrics.record_size(repo.len());

        Self {
            repo: Arc::new(repo),
            metrics: Arc::new(metrics),
            config,
        }
    }

    /// Handle scoped to one account and namespace
    pub fn namespace(
        &self,
        account_id: impl Into<String>,
        namespace: impl Into<String>,
    ) -> NamespaceCache<'_, P, M> {
        NamespaceCache::new(self, account_id.into(), namespace.into())
    }

    pub fn config(&self) -> &QueryCacheConfig {
        &self.config
    }

    fn full_key(&self, account_id: &str, namespace: &str, params: &Params) -> String {
        QueryKey::new(account_id, namespace)
            .with_params(params.clone())
            .full_key(&self.config.key_prefix)
    }

    /// Cached value if present and unexpired
    ///
    /// An expired entry is deleted as a side effect. A payload that does not
    /// decode as `T` is reported absent.
    pub async fn get<T>(&self, account_id: &str, namespace: &str, params: &Params) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let key = self.full_key(account_id, namespace, params);
        let start = Instant::now();

        let result = match self.repo.get(&key).await {
            // Entries written under another owner never leak across accounts
            Lookup::Hit(entry)
                if entry.account_id != account_id || entry.namespace != namespace =>
            {
                warn!(
                    target: "studio_cache",
                    key = %key,
                    owner = %entry.account_id,
                    "Cached entry belongs to another account or namespace"
                );
                self.metrics.record_miss(&key);
                None
            }
            Lookup::Hit(entry) => match serde_json::from_value::<T>(entry.data) {
                Ok(value) => {
                    self.metrics.record_hit(&key, CacheTier::Memory);
                    Some(value)
                }
                Err(err) => {
                    debug!(
                        target: "studio_cache",
                        key = %key,
                        error = %err,
                        "Cached payload has a different shape"
                    );
                    self.metrics.record_miss(&key);
                    None
                }
            },
            Lookup::Expired => {
                self.metrics.record_eviction(EvictionReason::Expired, 1);
                self.metrics.record_miss(&key);
                None
            }
            Lookup::Miss => {
                self.metrics.record_miss(&key);
                None
            }
        };

        self.metrics
            .record_latency(CacheOperation::Get, start.elapsed());
        result
    }

    /// Store a value, replacing any entry under the same key
    ///
    /// Persistent-tier problems never surface here; the only error is a
    /// value that cannot be serialized.
    pub async fn set<T>(
        &self,
        account_id: &str,
        namespace: &str,
        data: &T,
        params: &Params,
        options: impl Into<CacheOptions>,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let value =
            serde_json::to_value(data).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let options = options.into();
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);
        let key = self.full_key(account_id, namespace, params);

        let start = Instant::now();
        let report = self
            .repo
            .put(CacheEntry::new(key, account_id, namespace, value, ttl))
            .await;
        self.metrics
            .record_latency(CacheOperation::Set, start.elapsed());
        self.record_write(report);
        Ok(())
    }

    fn record_write(&self, report: WriteReport) {
        if report.capacity_evicted > 0 {
            self.metrics
                .record_eviction(EvictionReason::Capacity, report.capacity_evicted);
        }
        if report.quota_evicted > 0 {
            self.metrics
                .record_eviction(EvictionReason::Quota, report.quota_evicted);
        }
        self.metrics.record_size(self.repo.len());
    }

    /// Fetch through the cache
    ///
    /// With `force_refresh` or on a miss, `fetcher` runs exactly once and its
    /// result is stored and returned. Otherwise the cached value is returned
    /// and `fetcher` never runs. Fetcher errors are passed through unchanged
    /// and nothing is cached for them.
    pub async fn cached_fetch<T, E, F, Fut>(
        &self,
        account_id: &str,
        namespace: &str,
        fetcher: F,
        params: &Params,
        options: impl Into<CacheOptions>,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let options = options.into();
        if !options.force_refresh {
            if let Some(cached) = self.get::<T>(account_id, namespace, params).await {
                return Ok(cached);
            }
        }

        let start = Instant::now();
        let value = fetcher().await?;
        self.metrics
            .record_latency(CacheOperation::Fetch, start.elapsed());

        if let Err(err) = self.set(account_id, namespace, &value, params, options).await {
            warn!(
                target: "studio_cache",
                account_id = %account_id,
                namespace = %namespace,
                error = %err,
                "Fetched value could not be cached"
            );
        }
        Ok(value)
    }

    /// Remove one entry
    pub async fn invalidate(&self, account_id: &str, namespace: &str, params: &Params) -> bool {
        let key = self.full_key(account_id, namespace, params);
        let start = Instant::now();
        let removed = self.repo.remove(&key).await;
        self.record_invalidation(start, u64::from(removed));
        removed
    }

    /// Remove every entry of `namespace` for `account_id`, whatever the params
    pub async fn invalidate_namespace(&self, account_id: &str, namespace: &str) -> u64 {
        let start = Instant::now();
        let removed = self
            .repo
            .remove_where(|entry| entry.account_id == account_id && entry.namespace == namespace)
            .await;
        debug!(
            target: "studio_cache",
            account_id = %account_id,
            namespace = %namespace,
            removed = removed,
            "Namespace invalidated"
        );
        self.record_invalidation(start, removed);
        removed
    }

    /// Remove every entry of `account_id`
    pub async fn invalidate_account(&self, account_id: &str) -> u64 {
        let start = Instant::now();
        let removed = self
            .repo
            .remove_where(|entry| entry.account_id == account_id)
            .await;
        debug!(
            target: "studio_cache",
            account_id = %account_id,
            removed = removed,
            "Account invalidated"
        );
        self.record_invalidation(start, removed);
        removed
    }

    /// Empty the whole cache
    pub async fn clear_all(&self) -> u64 {
        let start = Instant::now();
        let removed = self.repo.clear().await;
        self.record_invalidation(start, removed);
        removed
    }

    fn record_invalidation(&self, start: Instant, removed: u64) {
        self.metrics
            .record_latency(CacheOperation::Invalidate, start.elapsed());
        if removed > 0 {
            self.metrics
                .record_eviction(EvictionReason::Invalidated, removed);
        }
        self.metrics.record_size(self.repo.len());
    }

    /// Drop every expired entry now
    pub async fn purge_expired(&self) -> u64 {
        let start = Instant::now();
        let purged = self.repo.purge_expired().await;
        self.metrics
            .record_latency(CacheOperation::Prune, start.elapsed());
        if purged > 0 {
            self.metrics.record_eviction(EvictionReason::Expired, purged);
        }
        purged
    }

    /// Whether writes currently reach the persistent tier
    pub fn persistence_active(&self) -> bool {
        self.repo.persistence_active()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.repo.stats()
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.repo.len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.repo.is_empty()
    }
}

impl<P, M> Clone for QueryCache<P, M>
where
    P: PersistentStore,
    M: CacheMetrics,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            metrics: self.metrics.clone(),
            config: self.config.clone(),
        }
    }
}
