//! studio-cache: account-scoped read-through cache for remote query results
//!
//! # Features
//!
//! - **Order-independent keys** derived from account, namespace and params
//! - **TTL expiry**, checked lazily on read
//! - **Bounded size** with oldest-write-first eviction
//! - **Two tiers**: in-process map plus an optional persistent store that
//!   survives restarts and never fails a caller
//! - **Namespace and account invalidation**
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use studio_cache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let cache = QueryCache::open(InMemoryStore::new(), QueryCacheConfig::default()).await;
//!     let params = Params::new().with("status", "active");
//!
//!     let contacts: Vec<String> = cache
//!         .cached_fetch(
//!             "acct-1",
//!             "contacts-list",
//!             || async { Ok::<_, CacheError>(vec!["ada".to_string()]) },
//!             &params,
//!             CacheOpts::new().ttl_secs(60),
//!         )
//!         .await?;
//!     println!("{:?}", contacts);
//!
//!     cache.invalidate_namespace("acct-1", "contacts-list").await;
//!     Ok(())
//! }
//! ```

mod manager;

// Re-export core
pub use studio_cache_core::*;

// Re-export storage
pub use studio_cache_storage::{BreakerConfig, InMemoryStore};
#[cfg(feature = "file")]
pub use studio_cache_storage::FileStore;

// Export manager
pub use manager::{NamespaceCache, QueryCache, QueryCacheConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CacheError, CacheOptions, CacheOpts, InMemoryStore, NamespaceCache, Params,
        PersistentStore, QueryCache, QueryCacheConfig, Result,
    };

    #[cfg(feature = "file")]
    pub use crate::FileStore;
}
