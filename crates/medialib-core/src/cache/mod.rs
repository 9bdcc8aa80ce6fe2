//! Response cache for gateway listing calls.
//!
//! `ResponseCache` memoizes listing responses under a key derived from the
//! query parameters. Entries older than 10 minutes are never served; they
//! read as a miss and stay in storage until overwritten.
//!
//! Storage is pluggable through `CacheStore`:
//! - `FileStore`: one JSON file per key in the cache directory
//! - `MemoryStore`: process-local map

pub mod manager;
pub mod store;

pub use manager::{cache_key, CachedData, ResponseCache, CACHE_TTL_MINUTES};
pub use store::{CacheStore, FileStore, MemoryStore};
