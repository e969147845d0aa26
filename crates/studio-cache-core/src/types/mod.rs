//! Core types for cache operations

mod entry;
mod options;
mod stats;

pub use entry::{now_millis, CacheEntry};
pub use options::{CacheOptions, CacheOpts};
pub use stats::CacheStats;
