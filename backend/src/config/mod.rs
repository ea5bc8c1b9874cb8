//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! database URLs, server port, token signing material and lifetimes, and the
//! identity cache backend.

use anyhow::{Context, Result, bail};
use jsonwebtoken::Algorithm;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Email confirmation and password-reset tokens always live for seven days.
pub const EMAIL_TOKEN_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Cached identities expire after fifteen minutes.
pub const IDENTITY_CACHE_TTL_SECONDS: u64 = 900;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    pub access_token_expires_in_seconds: u64,
    pub refresh_token_expires_in_seconds: u64,
    pub redis_url: Option<String>,
    pub cache_timeout_ms: u64,
    pub server_port: u16,
}

/// Token lifetimes handed to the auth service.
#[derive(Debug, Clone, Copy)]
pub struct TokenSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub email_ttl: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(3600),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            email_ttl: Duration::from_secs(EMAIL_TOKEN_TTL_SECONDS),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid number")?;

        let acquire_timeout_seconds = env::var("DB_ACQUIRE_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u64>()
            .context("DB_ACQUIRE_TIMEOUT_SECONDS must be a valid number")?;

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET not set")?;
        if jwt_secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let jwt_algorithm = parse_algorithm(
            &env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string()),
        )?;

        let access_token_expires_in_seconds = env::var("ACCESS_TOKEN_EXPIRES_IN_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()
            .context("ACCESS_TOKEN_EXPIRES_IN_SECONDS must be a valid number")?;

        let refresh_token_expires_in_seconds = env::var("REFRESH_TOKEN_EXPIRES_IN_SECONDS")
            .unwrap_or_else(|_| "604800".to_string())
            .parse::<u64>()
            .context("REFRESH_TOKEN_EXPIRES_IN_SECONDS must be a valid number")?;

        let redis_url = env::var("REDIS_URL").ok().filter(|url| !url.is_empty());

        let cache_timeout_ms = env::var("CACHE_TIMEOUT_MS")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<u64>()
            .context("CACHE_TIMEOUT_MS must be a valid number")?;

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("SERVER_PORT must be a valid number")?;

        Ok(Config {
            database_url,
            max_connections,
            acquire_timeout_seconds,
            jwt_secret,
            jwt_algorithm,
            access_token_expires_in_seconds,
            refresh_token_expires_in_seconds,
            redis_url,
            cache_timeout_ms,
            server_port,
        })
    }

    /// Token lifetimes derived from this configuration.
    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_ttl: Duration::from_secs(self.access_token_expires_in_seconds),
            refresh_ttl: Duration::from_secs(self.refresh_token_expires_in_seconds),
            email_ttl: Duration::from_secs(EMAIL_TOKEN_TTL_SECONDS),
        }
    }
}

/// Only HMAC algorithms make sense with a shared secret.
fn parse_algorithm(name: &str) -> Result<Algorithm> {
    let algorithm = Algorithm::from_str(name)
        .with_context(|| format!("JWT_ALGORITHM '{}' is not a known algorithm", name))?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => bail!("JWT_ALGORITHM {:?} requires key pairs; use HS256, HS384 or HS512", other),
    }
}
