//! Coordinates login reconciliation with collection sync.
//!
//! This is where sync failures stop being errors: every push or pull result
//! is folded into a per-entity status, and the caller gets a report back
//! even when parts of it failed.

use std::sync::Arc;
use std::time::Duration;

use super::collection::CollectionSynchronizer;
use super::error::{ErrorKind, LoginError, OrchestratorError, SyncError};
use super::reconciler::{IdentityReconciler, SessionIdentity};
use super::report::{EntityKind, EntityStatus, SyncReport};
use crate::credentials::CredentialVerifier;
use crate::models::{PantryIngredient, SavedRecipe};
use crate::session::SessionStore;
use crate::store::{timed, IdentityStore, Stores};

/// A successful login and the restore that followed it.
#[derive(Debug, Clone)]
pub struct LoginReport {
    pub session: SessionIdentity,
    pub restore: SyncReport,
}

pub struct SyncOrchestrator {
    reconciler: IdentityReconciler,
    local_identities: Arc<dyn IdentityStore>,
    cloud_identities: Arc<dyn IdentityStore>,
    ingredients: CollectionSynchronizer<PantryIngredient>,
    recipes: CollectionSynchronizer<SavedRecipe>,
    session: Arc<dyn SessionStore>,
    timeout: Duration,
}

impl SyncOrchestrator {
    pub fn new(
        local: Stores,
        cloud: Stores,
        verifier: Arc<dyn CredentialVerifier>,
        session: Arc<dyn SessionStore>,
        timeout: Duration,
    ) -> Self {
        let reconciler = IdentityReconciler::new(
            local.identities.clone(),
            cloud.identities.clone(),
            verifier,
            session.clone(),
            timeout,
        );

        Self {
            reconciler,
            local_identities: local.identities,
            cloud_identities: cloud.identities,
            ingredients: CollectionSynchronizer::new(local.ingredients, cloud.ingredients, timeout),
            recipes: CollectionSynchronizer::new(local.recipes, cloud.recipes, timeout),
            session,
            timeout,
        }
    }

    /// Reconciles the identity, then restores both collections for it.
    ///
    /// The session is saved before any collection is pulled.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginReport, LoginError> {
        let session = self.reconciler.login(email, password).await?;
        let restore = self.restore_owner(&session.id).await;

        Ok(LoginReport { session, restore })
    }

    /// Pulls and merges both collections for the current session.
    pub async fn restore(&self) -> Result<SyncReport, OrchestratorError> {
        let owner_id = self.current_owner().await?;
        Ok(self.restore_owner(&owner_id).await)
    }

    /// Pushes the profile and both collections for the current session.
    ///
    /// All three run to completion; one failing does not stop the others.
    pub async fn sync_to_cloud(&self) -> Result<SyncReport, OrchestratorError> {
        let owner_id = self.current_owner().await?;

        let (profile, ingredients, recipes) = tokio::join!(
            self.push_identity(&owner_id),
            self.ingredients.push(&owner_id),
            self.recipes.push(&owner_id),
        );

        let report = SyncReport::all_succeeded(vec![
            profile,
            collection_status(EntityKind::Ingredients, ingredients),
            collection_status(EntityKind::Recipes, recipes),
        ]);

        tracing::info!(owner_id = %owner_id, success = report.is_success(), "Sync to cloud finished");
        Ok(report)
    }

    async fn current_owner(&self) -> Result<String, OrchestratorError> {
        self.session
            .load()
            .await
            .map_err(OrchestratorError::Session)?
            .ok_or(OrchestratorError::NoSession)
    }

    async fn restore_owner(&self, owner_id: &str) -> SyncReport {
        let (ingredients, recipes) = tokio::join!(
            self.ingredients.restore(owner_id),
            self.recipes.restore(owner_id),
        );

        let report = SyncReport::restored(vec![
            collection_status(EntityKind::Ingredients, ingredients),
            collection_status(EntityKind::Recipes, recipes),
        ]);

        tracing::info!(owner_id, success = report.is_success(), "Restore finished");
        report
    }

    /// Upserts the local identity document; not a full replace.
    async fn push_identity(&self, owner_id: &str) -> EntityStatus {
        let identity = match self.local_identities.get_identity(owner_id).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                tracing::warn!(owner_id, "Session identity missing from local store");
                return EntityStatus::failed(
                    EntityKind::Profile,
                    ErrorKind::NotFound,
                    "no local profile for this session",
                );
            }
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Failed to read local profile");
                return EntityStatus::failed(
                    EntityKind::Profile,
                    ErrorKind::TransientIo,
                    e.to_string(),
                );
            }
        };

        match timed(self.timeout, self.cloud_identities.update_identity(&identity)).await {
            Ok(()) => EntityStatus::synced(EntityKind::Profile, 1),
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "Failed to push profile");
                EntityStatus::failed(EntityKind::Profile, ErrorKind::TransientIo, e.to_string())
            }
        }
    }
}

fn collection_status(entity: EntityKind, result: Result<usize, SyncError>) -> EntityStatus {
    match result {
        Ok(0) => EntityStatus::empty(entity),
        Ok(count) => EntityStatus::synced(entity, count),
        Err(e) => {
            tracing::warn!(entity = entity.noun(), error = %e, "Sync step failed");
            EntityStatus::failed(entity, e.kind(), e.to_string())
        }
    }
}
