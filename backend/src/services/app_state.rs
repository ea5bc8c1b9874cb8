//! Shared application state handed to every handler and access gate.

use crate::auth::identity_cache::IdentityCache;
use crate::auth::service::AuthService;
use crate::cache::{CacheStore, MemoryCache, RedisCache};
use crate::config::Config;
use crate::database::Database;
use crate::repositories::revocation_repository::RevocationRepository;
use crate::repositories::user_repository::UserRepository;
use crate::services::user_service::UserService;
use crate::utils::jwt::TokenCodec;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, users: Arc<UserService>) -> Self {
        Self { auth, users }
    }

    /// Wires the services against the configured database and cache backend.
    ///
    /// # Arguments
    /// * `config` - Loaded application configuration
    /// * `db` - Connected and migrated database
    ///
    /// # Errors
    /// Fails when a Redis URL is configured but the connection cannot be made.
    pub async fn from_config(config: &Config, db: &Database) -> Result<Self> {
        let store: Arc<dyn CacheStore> = match &config.redis_url {
            Some(url) => {
                let timeout = Duration::from_millis(config.cache_timeout_ms);
                tracing::info!("Using Redis identity cache");
                Arc::new(RedisCache::connect(url, timeout).await?)
            }
            None => {
                tracing::info!("REDIS_URL not set, using in-process identity cache");
                let cache = MemoryCache::new();
                cache.spawn_sweeper(CACHE_SWEEP_INTERVAL);
                Arc::new(cache)
            }
        };

        let directory = Arc::new(UserRepository::new(db.pool().clone()));
        let revocations = Arc::new(RevocationRepository::new(db.pool().clone()));

        let auth = Arc::new(AuthService::new(
            TokenCodec::new(&config.jwt_secret, config.jwt_algorithm),
            IdentityCache::new(store),
            directory.clone(),
            revocations,
            config.token_settings(),
        ));
        let users = Arc::new(UserService::new(directory, auth.clone()));

        Ok(Self::new(auth, users))
    }
}
