//! Read-through caching of a contacts listing

use std::sync::atomic::{AtomicUsize, Ordering};
use studio_cache::prelude::*;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Contact {
    id: u64,
    name: String,
}

async fn list_contacts(
    calls: &AtomicUsize,
    page: u64,
) -> std::result::Result<Vec<Contact>, String> {
    calls.fetch_add(1, Ordering::SeqCst);
    Ok(vec![Contact {
        id: page * 10,
        name: format!("contact on page {}", page),
    }])
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== studio-cache Basic Example ===\n");

    let cache = QueryCache::memory_only(QueryCacheConfig::default());
    let calls = AtomicUsize::new(0);

    // Param order does not matter
    let params = Params::new().with("page", 1).with("status", "active");
    let same_params = Params::new().with("status", "active").with("page", 1);

    let first = cache
        .cached_fetch(
            "acct-1",
            "contacts-list",
            || list_contacts(&calls, 1),
            &params,
            CacheOpts::new().ttl_secs(60),
        )
        .await?;
    println!("First fetch: {:?}", first);

    let second = cache
        .cached_fetch(
            "acct-1",
            "contacts-list",
            || list_contacts(&calls, 1),
            &same_params,
            CacheOpts::new().ttl_secs(60),
        )
        .await?;
    println!("Second fetch: {:?}", second);
    println!("Upstream calls: {}", calls.load(Ordering::SeqCst));

    // A contact was edited, drop every page of the listing
    let removed = cache.invalidate_namespace("acct-1", "contacts-list").await;
    println!("\nInvalidated {} entries", removed);

    let stats = cache.stats();
    println!(
        "Hits: {}, misses: {}, hit ratio: {:.2}",
        stats.hits,
        stats.misses,
        stats.hit_ratio()
    );

    Ok(())
}
