//! Middleware for protecting authenticated routes and handling authorization.
//!
//! `authenticate` resolves the bearer token once per request and stores the
//! result as a [`CurrentUser`] extension. The gates that follow read it from
//! there:
//!
//! - `logout_gate` rejects access tokens that were logged out
//! - `role_rights` rejects roles outside the route's allowed set
//! - `banned_gate` rejects banned identities

use crate::api::common::service_error_to_http;
use crate::auth::service::AuthService;
use crate::database::models::{Identity, Role};
use crate::errors::{ServiceError, ServiceResult};
use crate::services::app_state::AppState;
use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;

/// Identity behind the request together with the access token it presented.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub identity: Identity,
    pub token: String,
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> ServiceResult<&str> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(ServiceError::CredentialsInvalid)?;

    // The auth scheme is case-insensitive.
    let (scheme, token) = header
        .trim_start()
        .split_once(' ')
        .ok_or(ServiceError::CredentialsInvalid)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(ServiceError::CredentialsInvalid);
    }
    Ok(token)
}

fn current_user(request: &Request) -> ServiceResult<&CurrentUser> {
    request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ServiceError::internal_error("Access gate ran before authentication"))
}

/// JWT authentication middleware
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let token = bearer_token(request.headers())
        .map_err(service_error_to_http)?
        .to_string();

    let identity = state
        .auth
        .resolve_identity(&token)
        .await
        .map_err(service_error_to_http)?;

    request
        .extensions_mut()
        .insert(CurrentUser { identity, token });
    Ok(next.run(request).await)
}

/// Fails when the presented token is the one blacklisted for its identity.
pub async fn check_not_revoked(auth: &AuthService, current: &CurrentUser) -> ServiceResult<()> {
    if auth.is_revoked(&current.identity, &current.token).await? {
        return Err(ServiceError::forbidden(format!(
            "Operation forbidden for {}. Please login again!",
            current.identity.email
        )));
    }
    Ok(())
}

pub async fn logout_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let current = current_user(&request)
        .map_err(service_error_to_http)?
        .clone();
    check_not_revoked(&state.auth, &current)
        .await
        .map_err(service_error_to_http)?;
    Ok(next.run(request).await)
}

/// Roles allowed through a route.
#[derive(Debug, Clone)]
pub struct RoleRights {
    allowed: Arc<[Role]>,
}

impl RoleRights {
    pub fn new(allowed: &[Role]) -> Self {
        Self {
            allowed: allowed.into(),
        }
    }

    pub fn any_user() -> Self {
        Self::new(&[Role::Admin, Role::Moderator, Role::User])
    }

    pub fn admin_only() -> Self {
        Self::new(&[Role::Admin])
    }

    pub fn check(&self, identity: &Identity) -> ServiceResult<()> {
        if self.allowed.contains(&identity.role) {
            Ok(())
        } else {
            Err(ServiceError::forbidden(format!(
                "Operation forbidden for {}",
                identity.role
            )))
        }
    }
}

pub async fn role_rights(
    State(rights): State<RoleRights>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    let current = current_user(&request).map_err(service_error_to_http)?;
    rights
        .check(&current.identity)
        .map_err(service_error_to_http)?;
    Ok(next.run(request).await)
}

pub fn check_not_banned(identity: &Identity) -> ServiceResult<()> {
    if identity.banned {
        return Err(ServiceError::forbidden(format!(
            "User {} banned. Please contact your administrator!",
            identity.email
        )));
    }
    Ok(())
}

pub async fn banned_gate(request: Request, next: Next) -> Result<Response, (StatusCode, String)> {
    let current = current_user(&request).map_err(service_error_to_http)?;
    check_not_banned(&current.identity).map_err(service_error_to_http)?;
    Ok(next.run(request).await)
}

/// Whether a guarded route also turns away banned identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanCheck {
    Enforce,
    Skip,
}

/// Puts every route of `router` behind authentication and the access gates.
///
/// Route layers wrap outside-in, so the last one added runs first:
/// authenticate, then logout, role and ban checks.
pub fn guard(
    router: Router<AppState>,
    state: &AppState,
    rights: RoleRights,
    ban_check: BanCheck,
) -> Router<AppState> {
    let router = match ban_check {
        BanCheck::Enforce => router.route_layer(middleware::from_fn(banned_gate)),
        BanCheck::Skip => router,
    };

    router
        .route_layer(middleware::from_fn_with_state(rights, role_rights))
        .route_layer(middleware::from_fn_with_state(state.clone(), logout_gate))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user_repository::UserDirectory;
    use crate::test_support::{
        BrokenDirectory, BrokenRevocations, TestContext, access_token_for, call, wire_services,
    };
    use crate::utils::jwt::TokenScope;
    use axum::http::Method;
    use chrono::Utc;
    use std::time::Duration;

    fn identity(role: Role, banned: bool) -> Identity {
        Identity {
            id: 3,
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            password_hash: "hash".to_string(),
            role,
            banned,
            confirmed: true,
            refresh_token: None,
            avatar_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");

        headers.insert(AUTHORIZATION, "bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");

        headers.insert(AUTHORIZATION, "BEARER  abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");

        headers.insert(AUTHORIZATION, "Bearerabc.def".parse().unwrap());
        assert!(bearer_token(&headers).is_err());
    }

    #[test]
    fn test_role_rights_check() {
        let moderator = identity(Role::Moderator, false);

        assert!(
            RoleRights::new(&[Role::Admin, Role::Moderator])
                .check(&moderator)
                .is_ok()
        );
        assert!(RoleRights::any_user().check(&moderator).is_ok());
        match RoleRights::admin_only().check(&moderator) {
            Err(ServiceError::Forbidden { message }) => {
                assert_eq!(message, "Operation forbidden for moderator")
            }
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }

    #[test]
    fn test_banned_check() {
        assert!(check_not_banned(&identity(Role::User, false)).is_ok());
        match check_not_banned(&identity(Role::User, true)) {
            Err(ServiceError::Forbidden { message }) => assert_eq!(
                message,
                "User alice@x.com banned. Please contact your administrator!"
            ),
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_or_wrong_scope_bearer_is_401() {
        let ctx = TestContext::new().await;
        ctx.seed("alice", "alice@x.com", Role::User).await;
        let tokens = ctx.login("alice@x.com").await;

        let (status, _) = ctx.call(Method::GET, "/users/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, json) = ctx
            .call(Method::GET, "/users/me", Some(&tokens.refresh_token), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], "Could not validate credentials");

        let ghost_token = ctx
            .codec()
            .issue("ghost@x.com", TokenScope::Access, Duration::from_secs(60))
            .unwrap();
        let (status, _) = ctx
            .call(Method::GET, "/users/me", Some(&ghost_token), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_lowercase_bearer_scheme_is_accepted() {
        let ctx = TestContext::new().await;
        ctx.seed("alice", "alice@x.com", Role::User).await;
        let tokens = ctx.login("alice@x.com").await;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            format!("bearer {}", tokens.access_token).parse().unwrap(),
        );
        let token = bearer_token(&headers).unwrap();
        let identity = ctx.auth.resolve_identity(token).await.unwrap();
        assert_eq!(identity.email, "alice@x.com");
    }

    #[tokio::test]
    async fn test_logged_out_token_is_refused() {
        let ctx = TestContext::new().await;
        ctx.seed("alice", "alice@x.com", Role::User).await;
        let first = ctx.login("alice@x.com").await;
        let second = ctx.login("alice@x.com").await;

        let (status, json) = ctx
            .call(Method::GET, "/users/me", Some(&first.access_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["email"], "alice@x.com");

        let (status, _) = ctx
            .call(Method::GET, "/auth/logout", Some(&first.access_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = ctx
            .call(Method::GET, "/users/me", Some(&first.access_token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            json["message"],
            "Operation forbidden for alice@x.com. Please login again!"
        );

        let (status, _) = ctx
            .call(Method::GET, "/users/me", Some(&second.access_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_banned_user_is_refused() {
        let ctx = TestContext::new().await;
        let root = ctx.seed("root", "root@x.com", Role::Admin).await;
        let user = ctx.seed("alice", "alice@x.com", Role::User).await;
        let tokens = ctx.login("alice@x.com").await;

        ctx.users.set_banned(&root, user.id, true).await.unwrap();

        let (status, json) = ctx
            .call(Method::GET, "/users/me", Some(&tokens.access_token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            json["message"],
            "User alice@x.com banned. Please contact your administrator!"
        );
    }

    #[tokio::test]
    async fn test_role_gate_on_admin_routes() {
        let ctx = TestContext::new().await;
        ctx.seed("root", "root@x.com", Role::Admin).await;
        let target = ctx.seed("bobby", "bob@x.com", Role::User).await;
        ctx.seed("moder", "mod@x.com", Role::Moderator).await;
        let moderator = ctx.login("mod@x.com").await;
        let root = ctx.login("root@x.com").await;
        let uri = format!("/auth/change_role/{}", target.id);

        let (status, json) = ctx
            .call(
                Method::PATCH,
                &uri,
                Some(&moderator.access_token),
                Some(serde_json::json!({ "role": "admin" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], "Operation forbidden for moderator");

        let (status, json) = ctx
            .call(
                Method::PATCH,
                &uri,
                Some(&root.access_token),
                Some(serde_json::json!({ "role": "moderator" })),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["data"]["role"], "moderator");
    }

    #[tokio::test]
    async fn test_banned_admin_loses_admin_routes() {
        let ctx = TestContext::new().await;
        let root = ctx.seed("root", "root@x.com", Role::Admin).await;
        let admin = ctx.seed("admin", "admin@x.com", Role::Admin).await;
        let victim = ctx.seed("bobby", "bob@x.com", Role::User).await;
        let tokens = ctx.login("admin@x.com").await;

        ctx.users.set_banned(&root, admin.id, true).await.unwrap();
        let banned_message = "User admin@x.com banned. Please contact your administrator!";

        let (status, json) = ctx
            .call(
                Method::PATCH,
                &format!("/users/{}/ban", victim.id),
                Some(&tokens.access_token),
                Some(serde_json::json!({ "banned": true })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], banned_message);

        let (status, json) = ctx
            .call(
                Method::PATCH,
                &format!("/auth/change_role/{}", victim.id),
                Some(&tokens.access_token),
                Some(serde_json::json!({ "role": "admin" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], banned_message);

        let (status, json) = ctx
            .call(
                Method::GET,
                "/auth/refresh_token",
                Some(&tokens.refresh_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], banned_message);

        let victim = ctx.directory.find_by_id(victim.id).await.unwrap().unwrap();
        assert!(!victim.banned);
        assert_eq!(victim.role, Role::User);
    }

    #[tokio::test]
    async fn test_unreachable_directory_is_503() {
        let state = wire_services(Arc::new(BrokenDirectory), Arc::new(BrokenRevocations));
        let token = access_token_for("alice@x.com");

        let (status, _) = call(&state, Method::GET, "/users/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unreachable_revocation_store_is_503() {
        let ctx = TestContext::with_revocations(Arc::new(BrokenRevocations)).await;
        ctx.seed("alice", "alice@x.com", Role::User).await;
        let tokens = ctx.login("alice@x.com").await;

        let (status, _) = ctx
            .call(Method::GET, "/users/me", Some(&tokens.access_token), None)
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
