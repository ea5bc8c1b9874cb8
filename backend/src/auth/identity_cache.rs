//! Identity cache sitting in front of the user directory.
//!
//! Entries are keyed `user:<email>` and expire after fifteen minutes. The
//! cache is an optimisation only: backend failures and undecodable payloads
//! degrade to a miss.

use crate::cache::CacheStore;
use crate::config::IDENTITY_CACHE_TTL_SECONDS;
use crate::database::models::Identity;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct IdentityCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl IdentityCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            ttl: Duration::from_secs(IDENTITY_CACHE_TTL_SECONDS),
        }
    }

    pub fn key(email: &str) -> String {
        format!("user:{}", email)
    }

    pub async fn get(&self, email: &str) -> Option<Identity> {
        let key = Self::key(email);
        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Identity cache read failed");
                return None;
            }
        };

        match serde_json::from_slice::<Identity>(&bytes) {
            Ok(identity) => {
                tracing::debug!(key = %key, "Identity cache hit");
                Some(identity)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set(&self, identity: &Identity) {
        let key = Self::key(&identity.email);
        let bytes = match serde_json::to_vec(identity) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize identity");
                return;
            }
        };

        if let Err(e) = self.store.set(&key, bytes, self.ttl).await {
            tracing::warn!(key = %key, error = %e, "Identity cache write failed");
        }
    }

    pub async fn invalidate(&self, email: &str) {
        let key = Self::key(email);
        if let Err(e) = self.store.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "Identity cache eviction failed");
        }
    }
}
