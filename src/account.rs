//! Account lifecycle: registration, profile edits, password change, deletion.
//!
//! The local cache is always written first and always authoritative for the
//! session's identity. Cloud writes made here are best effort; the next
//! sync-to-cloud brings the cloud copy up to date.

use std::sync::Arc;
use std::time::Duration;

use crate::credentials::{hash_blocking, verify_blocking, CredentialError, CredentialVerifier};
use crate::models::{normalize_email, Identity, PantryIngredient, SavedRecipe};
use crate::session::SessionStore;
use crate::store::{timed, StoreError, Stores};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("an account already exists for {0}")]
    EmailTaken(String),
    #[error("not logged in")]
    NotLoggedIn,
    #[error("current password is incorrect")]
    WrongPassword,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub identity: Identity,
    /// False when the cloud copy could not be written.
    pub cloud_synced: bool,
}

/// Result of an account deletion.
#[derive(Debug, Clone)]
pub struct Deletion {
    pub identity_id: String,
    /// False when the cloud copy could not be removed.
    pub cloud_cleared: bool,
}

pub struct AccountService {
    local: Stores,
    cloud: Option<Stores>,
    verifier: Arc<dyn CredentialVerifier>,
    session: Arc<dyn SessionStore>,
    timeout: Duration,
}

impl AccountService {
    pub fn new(
        local: Stores,
        cloud: Option<Stores>,
        verifier: Arc<dyn CredentialVerifier>,
        session: Arc<dyn SessionStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            local,
            cloud,
            verifier,
            session,
            timeout,
        }
    }

    /// Creates an account locally and in the cloud, then logs it in.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Registration, AccountError> {
        let username = username.trim();
        let email = normalize_email(email);
        if username.is_empty() {
            return Err(AccountError::InvalidInput("username must not be empty".into()));
        }
        if !email.contains('@') {
            return Err(AccountError::InvalidInput(format!("'{}' is not an email", email)));
        }

        if self.local.identities.get_identity_by_email(&email).await?.is_some() {
            return Err(AccountError::EmailTaken(email));
        }
        if let Some(cloud) = &self.cloud {
            match timed(self.timeout, cloud.identities.get_identity_by_email(&email)).await {
                Ok(Some(_)) => return Err(AccountError::EmailTaken(email)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Cloud email check failed, continuing locally");
                }
            }
        }

        let password_hash = hash_blocking(self.verifier.clone(), password).await?;
        let identity = Identity::new(username, &email, password_hash);

        match self.local.identities.insert_identity(&identity).await {
            Ok(()) => {}
            Err(StoreError::DuplicateEmail(email)) => return Err(AccountError::EmailTaken(email)),
            Err(e) => return Err(e.into()),
        }

        let cloud_synced = match &self.cloud {
            Some(cloud) => {
                match timed(self.timeout, cloud.identities.insert_identity(&identity)).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(error = %e, "Account created locally only");
                        false
                    }
                }
            }
            None => false,
        };

        self.session.save(&identity.id).await?;

        tracing::info!(identity_id = %identity.id, cloud_synced, "Registered account");
        Ok(Registration {
            identity,
            cloud_synced,
        })
    }

    pub async fn logout(&self) -> Result<(), AccountError> {
        self.session.clear().await?;
        tracing::info!("Logged out");
        Ok(())
    }

    /// The identity bound to the session, if any.
    pub async fn current(&self) -> Result<Option<Identity>, AccountError> {
        match self.session.load().await? {
            Some(id) => Ok(self.local.identities.get_identity(&id).await?),
            None => Ok(None),
        }
    }

    async fn require_current(&self) -> Result<Identity, AccountError> {
        self.current().await?.ok_or(AccountError::NotLoggedIn)
    }

    /// Replaces the local password hash after checking the old password.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let mut identity = self.require_current().await?;

        if !verify_blocking(self.verifier.clone(), old_password, &identity.password_hash).await {
            return Err(AccountError::WrongPassword);
        }

        identity.password_hash = hash_blocking(self.verifier.clone(), new_password).await?;
        self.local.identities.update_identity(&identity).await?;

        tracing::info!(identity_id = %identity.id, "Password changed");
        Ok(())
    }

    /// Updates the fields that are given; `None` leaves a field unchanged.
    pub async fn update_profile(
        &self,
        username: Option<&str>,
        profile_image_ref: Option<&str>,
    ) -> Result<Identity, AccountError> {
        let mut identity = self.require_current().await?;

        if let Some(username) = username {
            let username = username.trim();
            if username.is_empty() {
                return Err(AccountError::InvalidInput("username must not be empty".into()));
            }
            identity.username = username.to_string();
        }
        if let Some(image) = profile_image_ref {
            identity.profile_image_ref = (!image.is_empty()).then(|| image.to_string());
        }

        self.local.identities.update_identity(&identity).await?;
        Ok(identity)
    }

    /// Removes the account and its collections from both stores.
    pub async fn delete_account(&self) -> Result<Deletion, AccountError> {
        let identity = self.require_current().await?;
        let owner_id = identity.id.as_str();

        self.local
            .ingredients
            .batch_replace(owner_id, &[] as &[PantryIngredient])
            .await?;
        self.local
            .recipes
            .batch_replace(owner_id, &[] as &[SavedRecipe])
            .await?;
        self.local.identities.delete_identity(owner_id).await?;

        let cloud_cleared = match &self.cloud {
            Some(cloud) => self.clear_cloud(cloud, owner_id).await,
            None => false,
        };

        self.session.clear().await?;

        tracing::info!(identity_id = owner_id, cloud_cleared, "Deleted account");
        Ok(Deletion {
            identity_id: identity.id.clone(),
            cloud_cleared,
        })
    }

    async fn clear_cloud(&self, cloud: &Stores, owner_id: &str) -> bool {
        let (identity, ingredients, recipes) = tokio::join!(
            timed(self.timeout, cloud.identities.delete_identity(owner_id)),
            timed(
                self.timeout,
                cloud.ingredients.batch_replace(owner_id, &[] as &[PantryIngredient])
            ),
            timed(
                self.timeout,
                cloud.recipes.batch_replace(owner_id, &[] as &[SavedRecipe])
            ),
        );

        let mut cleared = true;
        for result in [identity, ingredients, recipes] {
            if let Err(e) = result {
                tracing::warn!(owner_id, error = %e, "Failed to clear cloud account data");
                cleared = false;
            }
        }
        cleared
    }
}
