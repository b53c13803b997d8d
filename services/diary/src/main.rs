use std::sync::Arc;

use anyhow::Result;
use common::SupabaseClient;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod calendar;
mod config;
mod error;
mod middleware;
mod pages;
mod repositories;
mod routes;
mod session;
mod state;
mod validation;
mod view;

use crate::{
    config::ServerConfig,
    state::{AppState, Backend},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting diary service");

    // A missing provider configuration still serves the setup screen
    let backend = match SupabaseClient::from_env() {
        Ok(client) => Backend::from_provider(Arc::new(client)),
        Err(e) => {
            warn!("Identity provider unavailable: {}", e);
            Backend::Unconfigured(e)
        }
    };

    let server_config = ServerConfig::from_env()?;
    let address = server_config.bind_address();
    let app_state = AppState::new(backend, server_config)?;

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Diary service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
