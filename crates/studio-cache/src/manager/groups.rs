use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;

use studio_cache_core::{CacheMetrics, CacheOptions, Params, PersistentStore, QueryKey, Result};

use crate::QueryCache;

/// Handle on one (account, namespace) pair of a `QueryCache`
///
/// Saves repeating the scope on every call; `invalidate_all` drops the
/// whole namespace for the account.
pub struct NamespaceCache<'a, P, M>
where
    P: PersistentStore,
    M: CacheMetrics,
{
    cache: &'a QueryCache<P, M>,
    account_id: String,
    namespace: String,
}

impl<'a, P, M> NamespaceCache<'a, P, M>
where
    P: PersistentStore,
    M: CacheMetrics,
{
    pub(crate) fn new(cache: &'a QueryCache<P, M>, account_id: String, namespace: String) -> Self {
        Self {
            cache,
            account_id,
            namespace,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully-qualified key for `params` in this scope
    pub fn key(&self, params: &Params) -> String {
        QueryKey::new(self.account_id.as_str(), self.namespace.as_str())
            .with_params(params.clone())
            .full_key(&self.cache.config().key_prefix)
    }

    pub async fn get<T>(&self, params: &Params) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.cache.get(&self.account_id, &self.namespace, params).await
    }

    pub async fn set<T>(
        &self,
        data: &T,
        params: &Params,
        options: impl Into<CacheOptions>,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.cache
            .set(&self.account_id, &self.namespace, data, params, options)
            .await
    }

    pub async fn fetch<T, E, F, Fut>(
        &self,
        fetcher: F,
        params: &Params,
        options: impl Into<CacheOptions>,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.cache
            .cached_fetch(&self.account_id, &self.namespace, fetcher, params, options)
            .await
    }

    pub async fn invalidate(&self, params: &Params) -> bool {
        self.cache
            .invalidate(&self.account_id, &self.namespace, params)
            .await
    }

    /// Invalidate every parameter set of this namespace
    pub async fn invalidate_all(&self) -> u64 {
        self.cache
            .invalidate_namespace(&self.account_id, &self.namespace)
            .await
    }
}
