//! JWT token utilities for authentication and authorization.
//!
//! Provides token creation and validation for the three token kinds the
//! service hands out. Decoding checks signature and expiry only; callers
//! decide whether the scope fits the operation at hand.

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{ServiceError, ServiceResult};

/// What a token may be used for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TokenScope {
    #[serde(rename = "access_token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
    #[serde(rename = "email_token")]
    Email,
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (the user's email)
    pub sub: String,
    pub scope: TokenScope,
    /// Token issued at timestamp
    pub iat: i64,
    /// Token expiration timestamp
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

impl Claims {
    pub fn subject(&self) -> &str {
        &self.sub
    }

    pub fn has_scope(&self, scope: TokenScope) -> bool {
        self.scope == scope
    }
}

/// JWT token utility for creating and validating tokens
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a new codec signing with `secret` under `algorithm`.
    pub fn new(secret: &str, algorithm: Algorithm) -> Self {
        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        TokenCodec {
            algorithm,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Sign a new token for `subject` that expires `ttl` from now.
    pub fn issue(&self, subject: &str, scope: TokenScope, ttl: Duration) -> ServiceResult<String> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| ServiceError::internal_error(format!("Token lifetime too large: {}", e)))?;
        self.issue_with_lifetime(subject, scope, ttl)
    }

    fn issue_with_lifetime(
        &self,
        subject: &str,
        scope: TokenScope,
        ttl: chrono::Duration,
    ) -> ServiceResult<String> {
        let now = Utc::now();
        let exp = now + ttl;

        let claims = Claims {
            sub: subject.to_string(),
            scope,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::internal_error(format!("Token generation failed: {}", e)))
    }

    /// Validate and decode a JWT token.
    ///
    /// Every failure collapses into `CredentialsInvalid`.
    pub fn decode(&self, token: &str) -> ServiceResult<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => tracing::debug!("Rejected expired token"),
                    ErrorKind::InvalidSignature => tracing::debug!("Rejected token with bad signature"),
                    other => tracing::debug!("Rejected malformed token: {:?}", other),
                }
                ServiceError::CredentialsInvalid
            })
    }
}
