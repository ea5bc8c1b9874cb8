//! Module for core business logic services.
//!
//! This module encapsulates the services that orchestrate the user directory,
//! the token codec and the identity cache, plus the state object that hands
//! them to the HTTP layer.

pub mod app_state;
pub mod user_service;
