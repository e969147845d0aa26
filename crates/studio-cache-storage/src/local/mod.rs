//! Persistent key-value stores

#[cfg(feature = "file")]
mod file_store;
mod memory_store;

#[cfg(feature = "file")]
pub use file_store::FileStore;
pub use memory_store::InMemoryStore;
