//! Persistence layer for the auth core.
//!
//! Each repository exposes a narrow trait the services depend on, plus the
//! SQLite implementation used in production.

pub mod revocation_repository;
pub mod user_repository;
