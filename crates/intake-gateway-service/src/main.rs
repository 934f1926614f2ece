//! # Intake Gateway Service
//!
//! Binary entry point for the intake gateway.
//!
//! This executable:
//! - Loads `.env`, configuration files and environment overrides
//! - Initializes logging
//! - Builds the storage and webhook forwarder adapters
//! - Starts the HTTP server from intake-gateway-api

mod wiring;

use intake_gateway_api::{start_server, ServiceConfig, ServiceError};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal outside local development.
    let dotenv_path = dotenvy::dotenv().ok();

    let service_config = match wiring::load_config(|name| std::env::var(name).ok()) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet; fall back to a default subscriber.
            wiring::init_tracing(&ServiceConfig::default().logging);
            error!(error = %e, "Service configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    wiring::init_tracing(&service_config.logging);
    info!(
        env_file = ?dotenv_path,
        storage = ?service_config.storage.provider,
        key_scheme = ?service_config.upload.key_scheme,
        url_mode = ?service_config.upload.url_mode,
        "Starting intake gateway"
    );

    let storage = match wiring::build_storage(&service_config).await {
        Ok(storage) => storage,
        Err(e) => exit_with(e),
    };
    let forwarder = match wiring::build_forwarder(&service_config) {
        Ok(forwarder) => forwarder,
        Err(e) => exit_with(e),
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    let state = wiring::app_state(service_config, storage, forwarder);
    if let Err(e) = start_server(state).await {
        exit_with(e);
    }

    Ok(())
}

fn exit_with(e: ServiceError) -> ! {
    error!("Failed to start server: {}", e);
    std::process::exit(wiring::exit_code(&e));
}
