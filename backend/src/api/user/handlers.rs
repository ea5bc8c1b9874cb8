//! Handler functions for user profile and management API endpoints.
//!
//! These functions serve the current user's profile, look up other users'
//! public profiles, let users change their avatar, and let admins ban or
//! unban other users.

use crate::api::common::{ApiResponse, service_error_to_http};
use crate::auth::middleware::CurrentUser;
use crate::auth::models::{AvatarUpdateRequest, BanUpdateRequest, UserResponse};
use crate::services::app_state::AppState;
use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};

/// Returns the identity behind the bearer token.
#[axum::debug_handler]
pub async fn me(
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<UserResponse>>, (StatusCode, String)> {
    Ok(Json(ApiResponse::success(
        UserResponse::from(current.identity),
        "User retrieved successfully",
    )))
}

/// Returns the public profile of the user named in the path.
#[axum::debug_handler]
pub async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>, (StatusCode, String)> {
    let user = state
        .users
        .get_by_username(&username)
        .await
        .map_err(service_error_to_http)?;

    Ok(Json(ApiResponse::success(
        UserResponse::from(user),
        "User retrieved successfully",
    )))
}

#[axum::debug_handler]
pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<AvatarUpdateRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, (StatusCode, String)> {
    let user = state
        .users
        .update_avatar(&current.identity, payload)
        .await
        .map_err(service_error_to_http)?;

    tracing::info!("Avatar updated for user: {}", user.id);
    Ok(Json(ApiResponse::success(
        UserResponse::from(user),
        "Avatar updated successfully",
    )))
}

/// Bans or unbans a user. Admins only, with the same rules as role changes.
#[axum::debug_handler]
pub async fn set_ban(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Json(payload): Json<BanUpdateRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, (StatusCode, String)> {
    let user = state
        .users
        .set_banned(&current.identity, user_id, payload.banned)
        .await
        .map_err(service_error_to_http)?;

    let message = if user.banned {
        "User banned"
    } else {
        "User unbanned"
    };
    Ok(Json(ApiResponse::success(UserResponse::from(user), message)))
}
