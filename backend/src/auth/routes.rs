//! Defines the HTTP routes specifically for authentication.
//!
//! These routes handle registration, login, token refresh, email confirmation,
//! password resets, role changes and logout.

use crate::auth::handlers::*;
use crate::auth::middleware::{BanCheck, RoleRights, guard};
use crate::services::app_state::AppState;
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Creates the authentication router with all auth-related routes
pub fn auth_router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh_token", get(refresh_token))
        .route("/confirmed_email/{token}", get(confirmed_email))
        .route("/request_email", post(request_email))
        .route("/reset_password", post(reset_password))
        .route("/change_password/{token}", patch(change_password));

    let admin = guard(
        Router::new().route("/change_role/{user_id}", patch(change_role)),
        state,
        RoleRights::admin_only(),
        BanCheck::Enforce,
    );

    let session = guard(
        Router::new().route("/logout", get(logout)),
        state,
        RoleRights::any_user(),
        BanCheck::Skip,
    );

    public.merge(admin).merge(session)
}
