//! Handler functions for authentication-related API endpoints.
//!
//! These functions process incoming HTTP requests for registration, login,
//! token refresh, email confirmation and password resets, and hand the work
//! to `AuthService` and `UserService`.
//!
//! Outgoing email is not sent from here; issued email tokens are only logged.

use crate::api::common::{ApiResponse, service_error_to_http};
use crate::auth::middleware::{CurrentUser, bearer_token};
use crate::auth::models::*;
use crate::services::app_state::AppState;
use crate::services::user_service::ConfirmationRequest;
use axum::{
    extract::{Extension, Json, Path, State},
    http::{HeaderMap, StatusCode},
    response::Json as ResponseJson,
};

type HandlerResult<T> = Result<T, (StatusCode, String)>;

fn log_email_token(purpose: &str, email: &str, path: &str, token: &str) {
    tracing::info!(email = %email, "{} token issued", purpose);
    tracing::debug!("{} link: {}/{}", purpose, path, token);
}

/// Handle user registration request
#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> HandlerResult<(StatusCode, ResponseJson<ApiResponse<UserResponse>>)> {
    let (identity, email_token) = state
        .users
        .signup(payload)
        .await
        .map_err(service_error_to_http)?;

    log_email_token(
        "Confirmation",
        &identity.email,
        "/auth/confirmed_email",
        &email_token,
    );

    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(
            UserResponse::from(identity),
            "User successfully created. Check your email for confirmation.",
        )),
    ))
}

/// Handle user login request
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> HandlerResult<(StatusCode, ResponseJson<TokenResponse>)> {
    match state.auth.login(payload).await {
        Ok(response) => Ok((StatusCode::ACCEPTED, ResponseJson(response))),
        Err(error) => Err(service_error_to_http(error)),
    }
}

/// Handle token refresh request. The bearer token is the refresh token.
#[axum::debug_handler]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> HandlerResult<ResponseJson<TokenResponse>> {
    let token = bearer_token(&headers).map_err(service_error_to_http)?;

    match state.auth.refresh(token).await {
        Ok(response) => Ok(ResponseJson(response)),
        Err(error) => Err(service_error_to_http(error)),
    }
}

#[axum::debug_handler]
pub async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> HandlerResult<ResponseJson<ApiResponse<()>>> {
    let message = match state
        .users
        .confirm_email(&token)
        .await
        .map_err(service_error_to_http)?
    {
        Confirmation::Confirmed => "Email confirmed",
        Confirmation::AlreadyConfirmed => "Email is already confirmed",
    };

    Ok(ResponseJson(ApiResponse::acknowledged(message)))
}

/// Re-send the confirmation email.
///
/// Unknown addresses get the same answer as known ones.
#[axum::debug_handler]
pub async fn request_email(
    State(state): State<AppState>,
    Json(payload): Json<RequestEmail>,
) -> HandlerResult<ResponseJson<ApiResponse<()>>> {
    crate::errors::validate_request(&payload).map_err(service_error_to_http)?;

    let outcome = state
        .users
        .request_confirmation(&payload.email)
        .await
        .map_err(service_error_to_http)?;

    let message = match outcome {
        ConfirmationRequest::AlreadyConfirmed => "Your email is already confirmed",
        ConfirmationRequest::Issued(token) => {
            log_email_token(
                "Confirmation",
                &payload.email,
                "/auth/confirmed_email",
                &token,
            );
            "Check your email for confirmation."
        }
        ConfirmationRequest::UnknownEmail => "Check your email for confirmation.",
    };

    Ok(ResponseJson(ApiResponse::acknowledged(message)))
}

#[axum::debug_handler]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<RequestEmail>,
) -> HandlerResult<ResponseJson<ApiResponse<()>>> {
    crate::errors::validate_request(&payload).map_err(service_error_to_http)?;

    if let Some(token) = state
        .users
        .request_password_reset(&payload.email)
        .await
        .map_err(service_error_to_http)?
    {
        log_email_token(
            "Password reset",
            &payload.email,
            "/auth/change_password",
            &token,
        );
    }

    Ok(ResponseJson(ApiResponse::acknowledged(
        "Check your email for further instructions.",
    )))
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ChangePasswordRequest>,
) -> HandlerResult<ResponseJson<ApiResponse<()>>> {
    state
        .users
        .change_password(&token, payload)
        .await
        .map_err(service_error_to_http)?;

    Ok(ResponseJson(ApiResponse::acknowledged(
        "Password changed successfully",
    )))
}

/// Changes another user's role. Admins only.
#[axum::debug_handler]
pub async fn change_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
    Json(payload): Json<RoleUpdateRequest>,
) -> HandlerResult<(StatusCode, ResponseJson<ApiResponse<UserResponse>>)> {
    let updated = state
        .users
        .change_role(&current.identity, user_id, payload)
        .await
        .map_err(service_error_to_http)?;

    Ok((
        StatusCode::ACCEPTED,
        ResponseJson(ApiResponse::success(
            UserResponse::from(updated),
            "User role updated",
        )),
    ))
}

/// Blacklists the access token used for this request.
#[axum::debug_handler]
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> HandlerResult<ResponseJson<ApiResponse<()>>> {
    state
        .auth
        .logout(&current.identity, &current.token)
        .await
        .map_err(service_error_to_http)?;

    Ok(ResponseJson(ApiResponse::acknowledged(format!(
        "User {} successfully logged out",
        current.identity.email
    ))))
}
