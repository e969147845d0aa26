//! Two-tier write-through repository

mod circuit_breaker;
mod repository;

pub use circuit_breaker::{BreakerConfig, CircuitBreaker};
pub use repository::{Lookup, TierConfig, TieredRepository, WriteReport};
