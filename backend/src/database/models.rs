//! Rust structs that represent database table mappings.
//!
//! These models define the structure of data as it is stored in and retrieved
//! from the database. Note that these may differ from API-specific models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The first account ever created. Its role and ban status are immutable.
pub const SUPERADMIN_ID: i64 = 1;

/// A registered user as seen by the auth core.
///
/// This is also the value stored in the identity cache, so every field must
/// survive a JSON round trip.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub banned: bool,
    pub confirmed: bool,
    pub refresh_token: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn is_superadmin(&self) -> bool {
        self.id == SUPERADMIN_ID
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")] // Store as TEXT in SQLite
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Moderator => write!(f, "moderator"),
            Role::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "moderator" => Ok(Role::Moderator),
            "user" => Ok(Role::User),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Fields required to insert a new identity. Everything else takes the
/// column defaults (role `user`, not banned, not confirmed).
#[derive(Debug, Clone)]
pub struct CreateIdentity {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// The single revoked access token currently recorded for a user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct RevocationEntry {
    pub id: i64,
    pub user_id: i64,
    pub revoked_token: String,
    pub created_at: DateTime<Utc>,
}
