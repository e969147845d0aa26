//! Core traits for cache operations

mod key;
mod metrics;
mod serializer;
mod store;
mod tracing_metrics;

pub use self::key::{Params, QueryKey};
pub use self::metrics::{CacheMetrics, CacheOperation, CacheTier, EvictionReason, NoopMetrics};
pub use self::serializer::{JsonSerializer, Serializer};
pub use self::store::PersistentStore;
pub use self::tracing_metrics::TracingMetrics;

#[cfg(feature = "metrics")]
pub use self::metrics::MetricsCrateAdapter;
