//! Key-value cache backends.
//!
//! The identity cache talks to a `CacheStore`: an in-process map for single
//! instance deployments and tests, or Redis when several instances must share
//! cached identities.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod memory;
pub mod redis_store;

pub use memory::MemoryCache;
pub use redis_store::RedisCache;

/// Byte-oriented cache with per-entry TTL. Eviction beyond TTL is left to
/// the backend.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}
