//! Shared fixtures for unit and router tests: an in-memory database wired
//! into the real services, a user directory that counts its lookups, stores
//! that always fail, and a one-shot router caller.

use crate::api::build_router;
use crate::auth::identity_cache::IdentityCache;
use crate::auth::models::{LoginRequest, TokenResponse};
use crate::auth::service::AuthService;
use crate::cache::MemoryCache;
use crate::config::TokenSettings;
use crate::database::Database;
use crate::database::models::{CreateIdentity, Identity, RevocationEntry, Role};
use crate::repositories::revocation_repository::{RevocationRepository, RevocationStore};
use crate::repositories::user_repository::{UserDirectory, UserRepository};
use crate::services::app_state::AppState;
use crate::services::user_service::UserService;
use crate::utils::jwt::{TokenCodec, TokenScope};
use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use jsonwebtoken::Algorithm;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret";
pub const TEST_PASSWORD: &str = "password1";

/// Directory wrapper recording how often identities are looked up by email.
pub struct CountingDirectory {
    inner: UserRepository,
    email_lookups: AtomicUsize,
}

impl CountingDirectory {
    pub fn email_lookups(&self) -> usize {
        self.email_lookups.load(Ordering::SeqCst)
    }

    pub fn reset_lookups(&self) {
        self.email_lookups.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserDirectory for CountingDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        self.email_lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>> {
        self.inner.find_by_username(username).await
    }

    async fn create(&self, identity: CreateIdentity) -> Result<Identity> {
        self.inner.create(identity).await
    }

    async fn persist(&self, identity: &Identity) -> Result<()> {
        self.inner.persist(identity).await
    }
}

/// Directory whose every call fails, as when the database is down.
pub struct BrokenDirectory;

#[async_trait]
impl UserDirectory for BrokenDirectory {
    async fn find_by_email(&self, _email: &str) -> Result<Option<Identity>> {
        bail!("database is locked")
    }

    async fn find_by_id(&self, _id: i64) -> Result<Option<Identity>> {
        bail!("database is locked")
    }

    async fn find_by_username(&self, _username: &str) -> Result<Option<Identity>> {
        bail!("database is locked")
    }

    async fn create(&self, _identity: CreateIdentity) -> Result<Identity> {
        bail!("database is locked")
    }

    async fn persist(&self, _identity: &Identity) -> Result<()> {
        bail!("database is locked")
    }
}

/// Revocation store whose every call fails.
pub struct BrokenRevocations;

#[async_trait]
impl RevocationStore for BrokenRevocations {
    async fn revoke(&self, _user_id: i64, _token: &str) -> Result<RevocationEntry> {
        bail!("database is locked")
    }

    async fn is_revoked(&self, _user_id: i64, _token: &str) -> Result<bool> {
        bail!("database is locked")
    }
}

/// Wires the real services over the given stores, with a cheap bcrypt cost.
pub fn wire_services(
    directory: Arc<dyn UserDirectory>,
    revocations: Arc<dyn RevocationStore>,
) -> AppState {
    let auth = Arc::new(
        AuthService::new(
            TokenCodec::new(TEST_SECRET, Algorithm::HS256),
            IdentityCache::new(Arc::new(MemoryCache::new())),
            directory.clone(),
            revocations,
            TokenSettings::default(),
        )
        .with_password_cost(4), // bcrypt MIN_COST (not exported)
    );
    let users = Arc::new(UserService::new(directory, auth.clone()));
    AppState::new(auth, users)
}

/// Access token for `email` signed with the test secret.
pub fn access_token_for(email: &str) -> String {
    TokenCodec::new(TEST_SECRET, Algorithm::HS256)
        .issue(email, TokenScope::Access, Duration::from_secs(60))
        .unwrap()
}

/// Sends one request through the full application router.
pub async fn call(
    state: &AppState,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub struct TestContext {
    _db: Database,
    pub directory: Arc<CountingDirectory>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub state: AppState,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Real directory, but revocation checks go to `revocations`.
    pub async fn with_revocations(revocations: Arc<dyn RevocationStore>) -> Self {
        Self::build(Some(revocations)).await
    }

    async fn build(revocations: Option<Arc<dyn RevocationStore>>) -> Self {
        let db = Database::in_memory().await.unwrap();
        let directory = Arc::new(CountingDirectory {
            inner: UserRepository::new(db.pool().clone()),
            email_lookups: AtomicUsize::new(0),
        });
        let revocations = revocations
            .unwrap_or_else(|| Arc::new(RevocationRepository::new(db.pool().clone())));

        let state = wire_services(directory.clone(), revocations);

        TestContext {
            _db: db,
            directory,
            auth: state.auth.clone(),
            users: state.users.clone(),
            state,
        }
    }

    /// A codec sharing the services' secret, for minting hand-made tokens.
    pub fn codec(&self) -> TokenCodec {
        TokenCodec::new(TEST_SECRET, Algorithm::HS256)
    }

    /// Inserts a confirmed identity whose password is `TEST_PASSWORD`.
    pub async fn seed(&self, username: &str, email: &str, role: Role) -> Identity {
        let password_hash = self.auth.hash_password(TEST_PASSWORD).unwrap();
        let mut identity = self
            .directory
            .create(CreateIdentity {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await
            .unwrap();
        identity.role = role;
        identity.confirmed = true;
        self.directory.persist(&identity).await.unwrap();
        identity
    }

    pub async fn login(&self, email: &str) -> TokenResponse {
        self.auth
            .login(LoginRequest {
                username: email.to_string(),
                password: TEST_PASSWORD.to_string(),
            })
            .await
            .unwrap()
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        call(&self.state, method, uri, token, body).await
    }
}
