//! studio-cache-core: Core traits and types for the studio-cache library
//!
//! This crate provides the foundational types and traits shared by the
//! storage tiers and the `QueryCache` service.

mod error;
mod traits;
mod types;

pub use error::{CacheError, Result};
pub use traits::*;
pub use types::*;
