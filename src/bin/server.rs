//! Larder cloud server
//!
//! Serves the cloud document store over HTTP so several devices can share
//! one account's pantry and cookbook.
//!
//! # Configuration
//!
//! Environment variables:
//! - `LARDER_CLOUD_PORT`: Port to listen on (default: 8080)
//! - `LARDER_CLOUD_DATA_DIR`: Directory to store documents (default: ~/.local/share/larder-cloud)
//! - `LARDER_CLOUD_API_KEY`: Bearer key clients must send (default: none, no auth)
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `/users/...`: Identity and collection documents (auth required when a key is set)

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use larder::cloud::FileCloudStore;
use larder::server::{router, ServerConfig};
use larder::store::Stores;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "larder=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env();

    std::fs::create_dir_all(&config.data_dir)
        .map_err(|e| format!("Failed to create data directory: {}", e))?;

    tracing::info!("Data directory: {}", config.data_dir.display());
    if config.api_key.is_none() {
        tracing::warn!("LARDER_CLOUD_API_KEY is not set - requests are not authenticated");
    }

    let store = Arc::new(FileCloudStore::new(&config.data_dir));
    let app = router(Stores::from_shared(store), config.api_key);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
