//! User business logic service.
//!
//! Handles registration, email confirmation, password resets and the
//! administrative operations (role changes, bans) on identities. Every
//! mutation evicts the affected identity from the identity cache.

use crate::auth::models::{
    AvatarUpdateRequest, ChangePasswordRequest, Confirmation, RoleUpdateRequest, SignupRequest,
};
use crate::auth::service::AuthService;
use crate::database::models::{CreateIdentity, Identity, Role, SUPERADMIN_ID};
use crate::errors::{ServiceError, ServiceResult, validate_request};
use crate::repositories::user_repository::{UserDirectory, conflicting_column};
use std::sync::Arc;

/// Result of asking for a new confirmation email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationRequest {
    /// A fresh email token was minted for the address.
    Issued(String),
    AlreadyConfirmed,
    /// No identity uses the address; callers answer as if one was sent.
    UnknownEmail,
}

pub struct UserService {
    directory: Arc<dyn UserDirectory>,
    auth: Arc<AuthService>,
}

impl UserService {
    /// Creates a new UserService instance.
    ///
    /// # Arguments
    /// * `directory` - Where identities are looked up and persisted
    /// * `auth` - Token issuance, password hashing and cache eviction
    pub fn new(directory: Arc<dyn UserDirectory>, auth: Arc<AuthService>) -> Self {
        Self { directory, auth }
    }

    /// Registers a new identity.
    ///
    /// The very first identity (id 1) becomes the superadmin and is stored
    /// with the admin role.
    ///
    /// # Returns
    /// The created identity and an email token for confirming its address
    ///
    /// # Errors
    /// Returns `ServiceError` for:
    /// - Validation failures
    /// - Email or username already taken
    pub async fn signup(&self, request: SignupRequest) -> ServiceResult<(Identity, String)> {
        validate_request(&request)?;

        if self.directory.find_by_email(&request.email).await?.is_some() {
            return Err(ServiceError::already_exists("User with email", &request.email));
        }
        if self
            .directory
            .find_by_username(&request.username)
            .await?
            .is_some()
        {
            return Err(ServiceError::already_exists(
                "User with username",
                &request.username,
            ));
        }

        let password_hash = self.auth.hash_password(&request.password)?;
        let (username, email) = (request.username.clone(), request.email.clone());
        // A concurrent signup can claim the address between the checks and the insert.
        let mut identity = self
            .directory
            .create(CreateIdentity {
                username: request.username,
                email: request.email,
                password_hash,
            })
            .await
            .map_err(|e| match conflicting_column(&e) {
                Some("username") => ServiceError::already_exists("User with username", username),
                Some(_) => ServiceError::already_exists("User with email", email),
                None => ServiceError::from(e),
            })?;

        if identity.id == SUPERADMIN_ID {
            identity.role = Role::Admin;
            self.directory.persist(&identity).await?;
            tracing::info!("First user registered, granted superadmin");
        }

        let email_token = self.auth.issue_email_token(&identity)?;
        tracing::info!(user_id = identity.id, "User registered");
        Ok((identity, email_token))
    }

    /// Marks the address carried by an email token as confirmed.
    pub async fn confirm_email(&self, token: &str) -> ServiceResult<Confirmation> {
        let email = self.auth.decode_email_token(token)?;
        let mut identity = self
            .directory
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::validation("Verification error"))?;

        if identity.confirmed {
            return Ok(Confirmation::AlreadyConfirmed);
        }

        identity.confirmed = true;
        self.directory.persist(&identity).await?;
        self.auth.forget_identity(&identity.email).await;
        tracing::info!(user_id = identity.id, "Email confirmed");
        Ok(Confirmation::Confirmed)
    }

    /// Mints a new confirmation token for an unconfirmed address.
    pub async fn request_confirmation(&self, email: &str) -> ServiceResult<ConfirmationRequest> {
        let Some(identity) = self.directory.find_by_email(email).await? else {
            return Ok(ConfirmationRequest::UnknownEmail);
        };
        if identity.confirmed {
            return Ok(ConfirmationRequest::AlreadyConfirmed);
        }
        Ok(ConfirmationRequest::Issued(
            self.auth.issue_email_token(&identity)?,
        ))
    }

    /// Mints a password-reset token for a known address.
    ///
    /// # Returns
    /// `None` when no identity uses `email`
    pub async fn request_password_reset(&self, email: &str) -> ServiceResult<Option<String>> {
        match self.directory.find_by_email(email).await? {
            Some(identity) => Ok(Some(self.auth.issue_email_token(&identity)?)),
            None => Ok(None),
        }
    }

    /// Sets a new password for the owner of a password-reset token.
    pub async fn change_password(
        &self,
        token: &str,
        request: ChangePasswordRequest,
    ) -> ServiceResult<()> {
        validate_request(&request)?;
        let email = self.auth.decode_email_token(token)?;
        let mut identity = self
            .directory
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::validation("Verification error"))?;

        identity.password_hash = self.auth.hash_password(&request.new_password)?;
        self.directory.persist(&identity).await?;
        self.auth.forget_identity(&identity.email).await;
        tracing::info!(user_id = identity.id, "Password changed");
        Ok(())
    }

    /// Changes the role of `target_id` on behalf of `caller`.
    ///
    /// # Errors
    /// Returns `ServiceError` for:
    /// - Caller not an admin, or changing its own role
    /// - Target is the superadmin, or another admin while caller is not the superadmin
    /// - Unknown target
    /// - Role string outside admin/moderator/user
    pub async fn change_role(
        &self,
        caller: &Identity,
        target_id: i64,
        request: RoleUpdateRequest,
    ) -> ServiceResult<Identity> {
        let mut target = self.managed_target(caller, target_id, "role").await?;

        let role: Role = request
            .role
            .parse()
            .map_err(|_| ServiceError::validation("Invalid role provided"))?;

        target.role = role;
        self.directory.persist(&target).await?;
        self.auth.forget_identity(&target.email).await;
        tracing::info!(
            caller_id = caller.id,
            target_id = target.id,
            role = %role,
            "User role changed"
        );
        Ok(target)
    }

    /// Bans or unbans `target_id`. Same authorization rules as role changes.
    pub async fn set_banned(
        &self,
        caller: &Identity,
        target_id: i64,
        banned: bool,
    ) -> ServiceResult<Identity> {
        let mut target = self.managed_target(caller, target_id, "ban status").await?;

        target.banned = banned;
        self.directory.persist(&target).await?;
        self.auth.forget_identity(&target.email).await;
        tracing::info!(
            caller_id = caller.id,
            target_id = target.id,
            banned,
            "User ban status changed"
        );
        Ok(target)
    }

    /// Looks up a public profile by username.
    pub async fn get_by_username(&self, username: &str) -> ServiceResult<Identity> {
        self.directory
            .find_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", username))
    }

    /// Replaces the caller's avatar url.
    pub async fn update_avatar(
        &self,
        caller: &Identity,
        request: AvatarUpdateRequest,
    ) -> ServiceResult<Identity> {
        validate_request(&request)?;

        // The caller may come from the cache; mutate the stored copy.
        let mut identity = self
            .directory
            .find_by_id(caller.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", caller.id.to_string()))?;

        identity.avatar_url = Some(request.avatar_url);
        self.directory.persist(&identity).await?;
        self.auth.forget_identity(&identity.email).await;
        Ok(identity)
    }

    async fn managed_target(
        &self,
        caller: &Identity,
        target_id: i64,
        subject: &str,
    ) -> ServiceResult<Identity> {
        if caller.role != Role::Admin {
            return Err(ServiceError::forbidden(format!(
                "Permission denied. Only admin can change {}.",
                subject
            )));
        }
        if caller.id == target_id {
            return Err(ServiceError::forbidden(format!(
                "Permission denied. Own {} cannot be changed.",
                subject
            )));
        }
        if target_id == SUPERADMIN_ID {
            return Err(ServiceError::forbidden(format!(
                "Permission denied. Superadmin {} cannot be changed.",
                subject
            )));
        }

        let target = self
            .directory
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", target_id.to_string()))?;

        if target.role == Role::Admin && !caller.is_superadmin() {
            return Err(ServiceError::forbidden(format!(
                "Permission denied. Admin {} can be changed only by Superadmin (id={}).",
                subject, SUPERADMIN_ID
            )));
        }
        Ok(target)
    }
}
