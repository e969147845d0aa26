use studio_cache::prelude::*;
use studio_cache::TracingMetrics;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let metrics = TracingMetrics::new().with_service_name("example-service");

    // Store that refuses every call: the cache keeps working from memory
    let cache = QueryCache::open_with_metrics(
        Some(InMemoryStore::unavailable()),
        metrics,
        QueryCacheConfig::default(),
    )
    .await;

    let params = Params::new();
    cache
        .set("acct-1", "wallet-summary", &42u64, &params, CacheOpts::new().ttl_secs(60))
        .await?;

    let hit: Option<u64> = cache.get("acct-1", "wallet-summary", &params).await;
    println!("Got: {:?}", hit);

    let miss: Option<u64> = cache.get("acct-2", "wallet-summary", &params).await;
    println!("Got: {:?}", miss);

    println!("Persistence active: {}", cache.persistence_active());
    println!("Absorbed failures: {}", cache.stats().persist_failures);
    Ok(())
}
