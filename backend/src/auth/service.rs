//! Core business logic for the authentication system.
//!
//! Issues and verifies the three token kinds, resolves the identity behind an
//! access token (identity cache first, user directory on a miss) and runs the
//! login, refresh and logout flows.

use crate::auth::identity_cache::IdentityCache;
use crate::auth::models::{LoginRequest, TokenResponse};
use crate::config::TokenSettings;
use crate::database::models::Identity;
use crate::errors::{ServiceError, ServiceResult, validate_request};
use crate::repositories::revocation_repository::RevocationStore;
use crate::repositories::user_repository::UserDirectory;
use crate::utils::jwt::{TokenCodec, TokenScope};
use bcrypt::{DEFAULT_COST, hash, verify};
use std::sync::Arc;

/// Authentication service for handling tokens, identity resolution and sessions
pub struct AuthService {
    codec: TokenCodec,
    cache: IdentityCache,
    directory: Arc<dyn UserDirectory>,
    revocations: Arc<dyn RevocationStore>,
    settings: TokenSettings,
    password_cost: u32,
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(
        codec: TokenCodec,
        cache: IdentityCache,
        directory: Arc<dyn UserDirectory>,
        revocations: Arc<dyn RevocationStore>,
        settings: TokenSettings,
    ) -> Self {
        AuthService {
            codec,
            cache,
            directory,
            revocations,
            settings,
            password_cost: DEFAULT_COST,
        }
    }

    /// Overrides the bcrypt work factor.
    pub fn with_password_cost(mut self, cost: u32) -> Self {
        self.password_cost = cost;
        self
    }

    /// Function to hash a password before storing in database
    ///
    /// # Errors
    /// Returns `ServiceError` if hashing fails
    pub fn hash_password(&self, password: &str) -> ServiceResult<String> {
        hash(password, self.password_cost)
            .map_err(|e| ServiceError::internal_error(format!("Password hashing failed: {}", e)))
    }

    /// Function to verify a password against the stored hash
    ///
    /// # Returns
    /// `true` if password matches hash, `false` otherwise
    pub fn verify_password(&self, password: &str, hash: &str) -> ServiceResult<bool> {
        verify(password, hash).map_err(|e| {
            ServiceError::internal_error(format!("Password verification failed: {}", e))
        })
    }

    pub fn issue_access_token(&self, identity: &Identity) -> ServiceResult<String> {
        self.codec
            .issue(&identity.email, TokenScope::Access, self.settings.access_ttl)
    }

    pub fn issue_refresh_token(&self, identity: &Identity) -> ServiceResult<String> {
        self.codec
            .issue(&identity.email, TokenScope::Refresh, self.settings.refresh_ttl)
    }

    pub fn issue_email_token(&self, identity: &Identity) -> ServiceResult<String> {
        self.codec
            .issue(&identity.email, TokenScope::Email, self.settings.email_ttl)
    }

    /// Resolves the identity behind an access token.
    ///
    /// Bad signatures, expiry, a non-access scope and unknown subjects all
    /// fail with the same `CredentialsInvalid`.
    pub async fn resolve_identity(&self, token: &str) -> ServiceResult<Identity> {
        let claims = self.codec.decode(token)?;
        if !claims.has_scope(TokenScope::Access) {
            tracing::debug!(scope = ?claims.scope, "Rejected non-access token as bearer");
            return Err(ServiceError::CredentialsInvalid);
        }

        let email = claims.subject();
        if let Some(identity) = self.cache.get(email).await {
            return Ok(identity);
        }

        let identity = self
            .directory
            .find_by_email(email)
            .await
            .map_err(|e| {
                tracing::error!("User directory lookup failed: {}", e);
                ServiceError::service_unavailable("User directory unavailable")
            })?
            .ok_or(ServiceError::CredentialsInvalid)?;

        self.cache.set(&identity).await;
        Ok(identity)
    }

    /// Returns the email carried by a refresh token.
    pub fn decode_refresh_token(&self, token: &str) -> ServiceResult<String> {
        let claims = self.codec.decode(token)?;
        if !claims.has_scope(TokenScope::Refresh) {
            return Err(ServiceError::invalid_scope("Invalid scope for token"));
        }
        Ok(claims.sub)
    }

    /// Returns the email carried by a confirmation or password-reset token.
    pub fn decode_email_token(&self, token: &str) -> ServiceResult<String> {
        let claims = self.codec.decode(token)?;
        if !claims.has_scope(TokenScope::Email) {
            return Err(ServiceError::invalid_scope("Invalid scope for email token"));
        }
        Ok(claims.sub)
    }

    /// Authenticate user and generate a fresh access/refresh pair.
    pub async fn login(&self, login_request: LoginRequest) -> ServiceResult<TokenResponse> {
        validate_request(&login_request)?;

        let mut user = self
            .directory
            .find_by_email(&login_request.username)
            .await?
            .ok_or_else(|| ServiceError::unauthorized("Invalid email"))?;

        if user.banned {
            return Err(ServiceError::unauthorized(format!(
                "User {} banned. Please contact your administrator!",
                user.email
            )));
        }
        if !user.confirmed {
            return Err(ServiceError::unauthorized("Email is not confirmed"));
        }
        if !self.verify_password(&login_request.password, &user.password_hash)? {
            return Err(ServiceError::unauthorized("Invalid password"));
        }

        let access_token = self.issue_access_token(&user)?;
        let refresh_token = self.issue_refresh_token(&user)?;

        user.refresh_token = Some(refresh_token.clone());
        self.directory.persist(&user).await?;
        self.forget_identity(&user.email).await;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(TokenResponse::bearer(access_token, refresh_token))
    }

    /// Exchanges a refresh token for a new pair, rotating the stored token.
    ///
    /// A token that decodes fine but is not the one on record means it was
    /// already rotated away; the stored token is cleared so the holder of
    /// the newer one has to log in again too.
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<TokenResponse> {
        let email = self.decode_refresh_token(refresh_token)?;

        let mut user = self
            .directory
            .find_by_email(&email)
            .await?
            .ok_or(ServiceError::CredentialsInvalid)?;

        if user.banned {
            tracing::warn!(user_id = user.id, "Banned user attempted a token refresh");
            user.refresh_token = None;
            self.directory.persist(&user).await?;
            self.forget_identity(&user.email).await;
            return Err(ServiceError::unauthorized(format!(
                "User {} banned. Please contact your administrator!",
                user.email
            )));
        }

        if user.refresh_token.as_deref() != Some(refresh_token) {
            tracing::warn!(user_id = user.id, "Stale refresh token presented, clearing session");
            user.refresh_token = None;
            self.directory.persist(&user).await?;
            self.forget_identity(&user.email).await;
            return Err(ServiceError::InvalidRefreshToken);
        }

        let access_token = self.issue_access_token(&user)?;
        let new_refresh_token = self.issue_refresh_token(&user)?;

        user.refresh_token = Some(new_refresh_token.clone());
        self.directory.persist(&user).await?;
        self.forget_identity(&user.email).await;

        Ok(TokenResponse::bearer(access_token, new_refresh_token))
    }

    /// Blacklists the access token the user is currently presenting.
    pub async fn logout(&self, identity: &Identity, access_token: &str) -> ServiceResult<()> {
        self.revocations.revoke(identity.id, access_token).await?;
        tracing::info!(user_id = identity.id, "User logged out");
        Ok(())
    }

    pub async fn is_revoked(&self, identity: &Identity, access_token: &str) -> ServiceResult<bool> {
        self.revocations
            .is_revoked(identity.id, access_token)
            .await
            .map_err(|e| {
                tracing::error!("Revocation lookup failed: {}", e);
                ServiceError::service_unavailable("Token revocation store unavailable")
            })
    }

    /// Drops the cached copy of an identity after it changed.
    pub async fn forget_identity(&self, email: &str) {
        self.cache.invalidate(email).await;
    }
}
