//! Defines the HTTP routes for user profile and management.
//!
//! These routes provide endpoints for accessing and updating user-specific
//! data beyond authentication credentials.

use super::handlers::{get_user_by_username, me, set_ban, update_avatar};
use crate::auth::middleware::{BanCheck, RoleRights, guard};
use crate::services::app_state::AppState;
use axum::{
    Router,
    routing::{get, patch},
};

pub fn user_router(state: &AppState) -> Router<AppState> {
    let profile = guard(
        Router::new()
            .route("/me", get(me))
            .route("/avatar", patch(update_avatar))
            .route("/profile/{username}", get(get_user_by_username)),
        state,
        RoleRights::any_user(),
        BanCheck::Enforce,
    );

    let moderation = guard(
        Router::new().route("/{user_id}/ban", patch(set_ban)),
        state,
        RoleRights::admin_only(),
        BanCheck::Enforce,
    );

    profile.merge(moderation)
}
