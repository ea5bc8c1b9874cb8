//! Redis-backed cache store shared between server instances.
//!
//! Every command is bounded by a timeout and retried once after a short
//! backoff. A second failure is returned to the caller, which treats it as a
//! cache miss.

use super::CacheStore;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisResult, aio::ConnectionManager};
use std::future::Future;
use std::time::Duration;

const RETRY_BACKOFF: Duration = Duration::from_millis(50);
const MAX_ATTEMPTS: u32 = 2;

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
    timeout: Duration,
}

impl RedisCache {
    /// Connects to Redis at `url`.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (`redis://host:port/db`)
    /// * `timeout` - Upper bound for each individual command
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::open(url).context("REDIS_URL is not a valid Redis URL")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self { manager, timeout })
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, key: &str, command: F) -> Result<T>
    where
        F: Fn(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let mut last_error = anyhow!("Redis {} was not attempted", operation);

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }

            match tokio::time::timeout(self.timeout, command(self.manager.clone())).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    tracing::warn!(key = %key, attempt, error = %e, "Redis {} failed", operation);
                    last_error = e.into();
                }
                Err(_) => {
                    tracing::warn!(key = %key, attempt, "Redis {} timed out", operation);
                    last_error = anyhow!("Redis {} timed out after {:?}", operation, self.timeout);
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.run("GET", key, |mut conn| async move {
            conn.get::<_, Option<Vec<u8>>>(key).await
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let seconds = ttl.as_secs().max(1);
        self.run("SET", key, move |mut conn| {
            let value = value.clone();
            async move { conn.set_ex::<_, _, ()>(key, value, seconds).await }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.run("DEL", key, |mut conn| async move {
            conn.del::<_, ()>(key).await
        })
        .await
    }
}
