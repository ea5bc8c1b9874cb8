//! Database repository for user identities.
//!
//! Defines the `UserDirectory` contract the auth core looks users up through,
//! and its SQLite implementation.

use crate::database::models::{CreateIdentity, Identity};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

const IDENTITY_COLUMNS: &str = "id, username, email, password_hash, role, banned, confirmed, \
     refresh_token, avatar_url, created_at";

/// Lookup and persistence of identities.
///
/// Implementations must be safe to share across request tasks.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>>;

    /// Inserts a new identity and returns it with its assigned id.
    async fn create(&self, identity: CreateIdentity) -> Result<Identity>;

    /// Commits every mutable field of `identity` (matched by id).
    async fn persist(&self, identity: &Identity) -> Result<()>;
}

/// Unique column an insert collided with, when that is why `create` failed.
///
/// Returns `"username"` or `"email"` for a UNIQUE violation on `users`, and
/// `None` for every other failure.
pub fn conflicting_column(error: &anyhow::Error) -> Option<&'static str> {
    let db_error = error.downcast_ref::<sqlx::Error>()?.as_database_error()?;
    if !db_error.is_unique_violation() {
        return None;
    }
    if db_error.message().contains("users.username") {
        Some("username")
    } else {
        Some("email")
    }
}

/// Repository for user database operations.
#[derive(Clone)]
pub struct UserRepository {
    /// Shared SQLite connection pool
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository instance.
    ///
    /// # Arguments
    /// * `pool` - SQLite connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    /// Retrieves a user by their email.
    ///
    /// # Returns
    /// `Some(Identity)` if found, `None` otherwise
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let query = format!("SELECT {} FROM users WHERE email = ?", IDENTITY_COLUMNS);
        let user = sqlx::query_as::<_, Identity>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Retrieves a user by their unique identifier.
    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>> {
        let query = format!("SELECT {} FROM users WHERE id = ?", IDENTITY_COLUMNS);
        let user = sqlx::query_as::<_, Identity>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Retrieves a user by their username.
    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>> {
        let query = format!("SELECT {} FROM users WHERE username = ?", IDENTITY_COLUMNS);
        let user = sqlx::query_as::<_, Identity>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Creates a new user in the database.
    ///
    /// # Returns
    /// The newly created Identity with all fields populated
    async fn create(&self, identity: CreateIdentity) -> Result<Identity> {
        let query = format!(
            r#"
            INSERT INTO users (username, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING {}
            "#,
            IDENTITY_COLUMNS
        );
        let user = sqlx::query_as::<_, Identity>(&query)
            .bind(identity.username)
            .bind(identity.email)
            .bind(identity.password_hash)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(user)
    }

    async fn persist(&self, identity: &Identity) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = ?, email = ?, password_hash = ?, role = ?, banned = ?,
                confirmed = ?, refresh_token = ?, avatar_url = ?
            WHERE id = ?
            "#,
        )
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(identity.role)
        .bind(identity.banned)
        .bind(identity.confirmed)
        .bind(&identity.refresh_token)
        .bind(&identity.avatar_url)
        .bind(identity.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("User {} does not exist", identity.id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::database::models::Role;

    fn new_user(username: &str, email: &str) -> CreateIdentity {
        CreateIdentity {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_applies_column_defaults() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());

        let user = repo.create(new_user("alice", "alice@x.com")).await.unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(user.role, Role::User);
        assert!(!user.banned);
        assert!(!user.confirmed);
        assert_eq!(user.refresh_token, None);
        assert_eq!(user.avatar_url, None);
    }

    #[tokio::test]
    async fn test_lookups() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        let created = repo.create(new_user("alice", "alice@x.com")).await.unwrap();

        let by_email = repo.find_by_email("alice@x.com").await.unwrap().unwrap();
        let by_id = repo.find_by_id(created.id).await.unwrap().unwrap();
        let by_name = repo.find_by_username("alice").await.unwrap().unwrap();

        assert_eq!(by_email, created);
        assert_eq!(by_id, created);
        assert_eq!(by_name, created);
        assert!(repo.find_by_email("bob@x.com").await.unwrap().is_none());
        assert!(repo.find_by_id(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        repo.create(new_user("alice", "alice@x.com")).await.unwrap();

        let error = repo
            .create(new_user("alice2", "alice@x.com"))
            .await
            .unwrap_err();
        assert_eq!(conflicting_column(&error), Some("email"));

        let error = repo
            .create(new_user("alice", "alice2@x.com"))
            .await
            .unwrap_err();
        assert_eq!(conflicting_column(&error), Some("username"));
    }

    #[tokio::test]
    async fn test_other_failures_are_not_conflicts() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        let mut user = repo.create(new_user("alice", "alice@x.com")).await.unwrap();
        user.id = 99;

        let error = repo.persist(&user).await.unwrap_err();
        assert_eq!(conflicting_column(&error), None);
    }

    #[tokio::test]
    async fn test_persist_commits_mutable_fields() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        let mut user = repo.create(new_user("alice", "alice@x.com")).await.unwrap();

        user.role = Role::Moderator;
        user.banned = true;
        user.confirmed = true;
        user.refresh_token = Some("refresh".to_string());
        user.avatar_url = Some("https://img.example/alice.png".to_string());
        repo.persist(&user).await.unwrap();

        let stored = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored, user);
    }

    #[tokio::test]
    async fn test_persist_unknown_user_fails() {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        let mut user = repo.create(new_user("alice", "alice@x.com")).await.unwrap();
        user.id = 99;

        assert!(repo.persist(&user).await.is_err());
    }
}
