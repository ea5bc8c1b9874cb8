//! Central module for organizing the application's main API endpoints.
//!
//! This module acts as a top-level container for the API domains and
//! assembles the full application router, including the authentication
//! routes that live under `auth`.

pub mod common;
pub mod user;

use crate::api::common::ApiResponse;
use crate::auth::routes::auth_router;
use crate::services::app_state::AppState;
use axum::{Router, response::Json, routing::get};

/// Builds the application router with every route and access gate in place.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .nest("/auth", auth_router(&state))
        .nest("/users", user::routes::user_router(&state))
        .with_state(state)
}

async fn root_handler() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(
        serde_json::json!({
            "service": "authgate",
            "version": env!("CARGO_PKG_VERSION")
        }),
        "Welcome to the authgate API",
    ))
}
