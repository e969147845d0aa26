//! studio-cache-storage: Storage tiers for studio-cache
//!
//! - [`MemoryTier`]: the in-process map every read is served from
//! - [`InMemoryStore`] / [`FileStore`]: persistent key-value stores
//! - [`TieredRepository`]: write-through pairing of the two tiers

pub mod local;
pub mod memory;
pub mod tiered;

pub use local::InMemoryStore;
#[cfg(feature = "file")]
pub use local::FileStore;
pub use memory::MemoryTier;
pub use tiered::{
    BreakerConfig, CircuitBreaker, Lookup, TierConfig, TieredRepository, WriteReport,
};
