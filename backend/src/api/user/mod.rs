//! Module for user profile and moderation endpoints.

pub mod handlers;
pub mod routes;
