//! Main entry point for the authgate backend.
//!
//! This file initializes the Axum web server, sets up database connections,
//! wires the services and registers all API routes and access gates.

mod api;
mod auth;
mod cache;
mod config;
mod database;
mod errors;
mod repositories;
mod services;
mod utils;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use config::Config;
use database::Database;
use services::app_state::AppState;
use tracing::info;
use tracing_subscriber::fmt::init;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::from_env()?;
    let db = Database::new(&config).await?;
    let state = AppState::from_config(&config, &db).await?;

    let app = api::build_router(state);

    let bind_address = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    info!("Starting authgate server on port {}", config.server_port);
    axum::serve(listener, app).await?;

    db.close().await;
    Ok(())
}
