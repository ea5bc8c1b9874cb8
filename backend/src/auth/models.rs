//! Data structures for authentication-related requests and responses.
//!
//! This module defines the payloads accepted by the auth and user endpoints
//! and the shapes returned to clients. Identities themselves live in
//! `database::models`.

use crate::database::models::{Identity, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Signup request payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 5, max = 15, message = "Username must be between 5-15 characters"))]
    pub username: String,

    #[validate(
        email(message = "Must be a valid email"),
        length(max = 100, message = "Email too long")
    )]
    pub email: String,

    #[validate(length(min = 8, max = 15, message = "Password must be between 8-15 characters"))]
    pub password: String,
}

/// Login request payload. `username` carries the email address.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Access/refresh pair returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Public view of an identity. Never exposes the password hash or refresh token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub banned: bool,
    pub confirmed: bool,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for UserResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
            email: identity.email,
            role: identity.role,
            banned: identity.banned,
            confirmed: identity.confirmed,
            avatar_url: identity.avatar_url,
            created_at: identity.created_at,
        }
    }
}

/// Role change payload. Kept as a string so unknown roles reach the
/// service and are reported as invalid input.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BanUpdateRequest {
    pub banned: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestEmail {
    #[validate(email(message = "Must be a valid email"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 8, max = 15, message = "Password must be between 8-15 characters"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AvatarUpdateRequest {
    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar_url: String,
}

/// Outcome of an email confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    AlreadyConfirmed,
}
