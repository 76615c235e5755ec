//! The cloud document service: the HTTP face of a [`FileCloudStore`].
//!
//! [`FileCloudStore`]: crate::cloud::FileCloudStore

mod auth;
mod error;
mod routes;

pub use error::ApiError;
pub use routes::{router, AppState};

use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Directory holding the cloud documents
    pub data_dir: PathBuf,
    /// Bearer key required on every non-health route, if set
    pub api_key: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("LARDER_CLOUD_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = lookup("LARDER_CLOUD_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("larder-cloud")
            });

        let api_key = lookup("LARDER_CLOUD_API_KEY").filter(|k| !k.is_empty());

        Self {
            port,
            data_dir,
            api_key,
        }
    }
}
