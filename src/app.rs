//! Wiring: builds stores and services from a loaded [`Config`].

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::account::AccountService;
use crate::cloud::{FileCloudStore, HttpCloudStore};
use crate::config::{CloudConfig, Config};
use crate::credentials::{CredentialVerifier, Pbkdf2Verifier};
use crate::db::{self, IngredientRepository, RecipeRepository};
use crate::session::{FileSessionStore, SessionStore};
use crate::store::Stores;
use crate::sync::SyncOrchestrator;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("failed to open database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cloud is not configured; set cloud.url in config or LARDER_CLOUD_URL")]
    CloudNotConfigured,
}

/// Everything a command needs, opened once per process.
pub struct App {
    pub config: Config,
    pub pool: SqlitePool,
    pub local: Stores,
    pub cloud: Option<Stores>,
    pub session: Arc<dyn SessionStore>,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl App {
    pub async fn open(config: Config) -> Result<Self, AppError> {
        let pool = db::init_db(&config.database_path.value).await?;
        let local = db::local_stores(&pool);
        let cloud = cloud_stores(&config.cloud);
        let session = Arc::new(FileSessionStore::new(&config.data_dir.value));

        Ok(Self {
            config,
            pool,
            local,
            cloud,
            session,
            verifier: Arc::new(Pbkdf2Verifier::new()),
        })
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(
            self.local.clone(),
            self.cloud.clone(),
            self.verifier.clone(),
            self.session.clone(),
            self.config.cloud.timeout(),
        )
    }

    pub fn orchestrator(&self) -> Result<SyncOrchestrator, AppError> {
        let cloud = self.cloud.clone().ok_or(AppError::CloudNotConfigured)?;

        Ok(SyncOrchestrator::new(
            self.local.clone(),
            cloud,
            self.verifier.clone(),
            self.session.clone(),
            self.config.cloud.timeout(),
        ))
    }

    /// Concrete repository, for the operations beyond the sync traits.
    pub fn ingredients(&self) -> IngredientRepository {
        IngredientRepository::new(self.pool.clone())
    }

    pub fn recipes(&self) -> RecipeRepository {
        RecipeRepository::new(self.pool.clone())
    }

    /// Owner id of the current session, or an error telling the user to log in.
    pub async fn require_owner(&self) -> Result<String, Box<dyn std::error::Error>> {
        self.session
            .load()
            .await?
            .ok_or_else(|| "Not logged in. Run 'larder login' first.".into())
    }
}

/// Picks a cloud adapter from the configured URL.
///
/// `file://<dir>` opens a directory directly; anything else is a server URL.
pub fn cloud_stores(config: &CloudConfig) -> Option<Stores> {
    let url = config.url.as_deref()?;

    match url.strip_prefix("file://") {
        Some(dir) => Some(Stores::from_shared(Arc::new(FileCloudStore::new(dir)))),
        None => Some(Stores::from_shared(Arc::new(HttpCloudStore::new(
            url,
            config.api_key.clone(),
        )))),
    }
}
