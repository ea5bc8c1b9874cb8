//! Global application error types.
//!
//! This module defines the error type shared by the token codec, the auth and
//! user services, the access gates and the repositories. Every failure here is
//! scoped to a single request; conversion to HTTP responses happens in
//! `api::common::service_error_to_http`.

use thiserror::Error;
use validator::Validate;

/// Generic service error that can be used across all entities
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed, expired or forged token, or a subject that no longer exists.
    /// Deliberately carries no detail.
    #[error("Could not validate credentials")]
    CredentialsInvalid,

    /// Token decoded fine but was minted for another purpose.
    #[error("{message}")]
    InvalidScope { message: String },

    /// Presented refresh token is not the one on record.
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// Login rejected with a user-facing reason.
    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{entity} not found: {identifier}")]
    NotFound { entity: String, identifier: String },

    #[error("{entity} already exists: {identifier}")]
    AlreadyExists { entity: String, identifier: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Database error: {source}")]
    Database {
        #[from]
        source: anyhow::Error,
    },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    // Helper constructors for common patterns

    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn already_exists(entity: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            identifier: identifier.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

/// Runs the `validator` rules on a request and folds every field error into
/// one `Validation` message.
pub fn validate_request<T: Validate>(request: &T) -> ServiceResult<()> {
    if let Err(validation_errors) = request.validate() {
        let mut error_messages: Vec<String> = validation_errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    format!(
                        "{}: {}",
                        field,
                        error.message.as_ref().unwrap_or(&"Invalid value".into())
                    )
                })
            })
            .collect();
        error_messages.sort();
        return Err(ServiceError::validation(error_messages.join(", ")));
    }
    Ok(())
}
