//! Cache entries persisted to a directory survive a restart

use studio_cache::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join("studio-cache-example");
    let params = Params::new().with("q", "pricing");

    {
        let store = FileStore::open(&dir).await?;
        let cache = QueryCache::open(store, QueryCacheConfig::default()).await;
        cache
            .set(
                "acct-1",
                "search",
                &vec!["pricing page", "pricing faq"],
                &params,
                CacheOpts::new().ttl_mins(10),
            )
            .await?;
        println!("Wrote {} entry to {}", cache.len(), dir.display());
    }

    // Simulated restart
    let store = FileStore::open(&dir).await?;
    let cache = QueryCache::open(store, QueryCacheConfig::default()).await;
    let restored: Option<Vec<String>> = cache.get("acct-1", "search", &params).await;
    println!("Restored after reopen: {:?}", restored);

    cache.clear_all().await;
    Ok(())
}
