//! In-process cache tier

mod backend;

pub use backend::MemoryTier;
