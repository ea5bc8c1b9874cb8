//! Database repository for the per-user access token blacklist.
//!
//! Each user has at most one row: the access token revoked by their most
//! recent logout. A new logout replaces the previous row, so an older token
//! is no longer considered revoked once a newer one has been.

use crate::database::models::RevocationEntry;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

/// Single-slot token blacklist keyed by user id.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Records `token` as the revoked token for `user_id`, dropping whatever
    /// was recorded before.
    async fn revoke(&self, user_id: i64, token: &str) -> Result<RevocationEntry>;

    /// True iff the slot for `user_id` holds exactly `token`.
    async fn is_revoked(&self, user_id: i64, token: &str) -> Result<bool>;
}

/// Repository for blacklisted token operations.
#[derive(Clone)]
pub struct RevocationRepository {
    /// Shared SQLite connection pool
    pool: SqlitePool,
}

impl RevocationRepository {
    /// Creates a new RevocationRepository instance.
    ///
    /// # Arguments
    /// * `pool` - SQLite connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for RevocationRepository {
    async fn revoke(&self, user_id: i64, token: &str) -> Result<RevocationEntry> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM blacklisted_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if removed.rows_affected() > 0 {
            tracing::debug!(user_id, "Old blacklisted token removed");
        }

        let entry = sqlx::query_as::<_, RevocationEntry>(
            r#"
            INSERT INTO blacklisted_tokens (user_id, revoked_token, created_at)
            VALUES (?, ?, ?)
            RETURNING id, user_id, revoked_token, created_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(entry)
    }

    async fn is_revoked(&self, user_id: i64, token: &str) -> Result<bool> {
        let stored = sqlx::query_scalar::<_, String>(
            "SELECT revoked_token FROM blacklisted_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stored.is_some_and(|stored| stored == token))
    }
}
