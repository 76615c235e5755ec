//! Login-time identity reconciliation.
//!
//! Decides which copy of an identity is authoritative when a user logs in
//! and repairs the local side to match:
//!
//! | cloud   | local   | result                                            |
//! |---------|---------|---------------------------------------------------|
//! | absent  | present | local row deleted, `NotFound`                     |
//! | absent  | absent  | `NotFound`                                        |
//! | present | present | verified against the local hash                   |
//! | present | absent  | verified against the cloud hash, then adopted     |
//!
//! A failed or timed-out lookup counts as "absent". That includes the cloud
//! being unreachable, which takes the orphan branch and drops the local row.

use std::sync::Arc;
use std::time::Duration;

use super::error::LoginError;
use crate::credentials::{verify_blocking, CredentialVerifier};
use crate::models::{normalize_email, Identity};
use crate::session::SessionStore;
use crate::store::{timed, IdentityStore};

/// The identity a successful login bound the session to.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub id: String,
    pub identity: Identity,
    /// True when the identity was copied from the cloud onto this device.
    pub adopted: bool,
}

pub struct IdentityReconciler {
    local: Arc<dyn IdentityStore>,
    cloud: Arc<dyn IdentityStore>,
    verifier: Arc<dyn CredentialVerifier>,
    session: Arc<dyn SessionStore>,
    timeout: Duration,
}

impl IdentityReconciler {
    pub fn new(
        local: Arc<dyn IdentityStore>,
        cloud: Arc<dyn IdentityStore>,
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

    /// Resolves a login and persists the session before returning.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionIdentity, LoginError> {
        let email = normalize_email(email);

        let (local, cloud) = tokio::join!(self.lookup_local(&email), self.lookup_cloud(&email));

        let resolved = match (local, cloud) {
            (Some(local), None) => {
                self.remove_orphan(&local).await;
                return Err(LoginError::NotFound { email });
            }
            (None, None) => {
                tracing::info!(email = %email, "No identity found in either store");
                return Err(LoginError::NotFound { email });
            }
            (Some(local), Some(_)) => {
                if !verify_blocking(self.verifier.clone(), password, &local.password_hash).await {
                    return Err(LoginError::Unauthorized);
                }
                SessionIdentity {
                    id: local.id.clone(),
                    identity: local,
                    adopted: false,
                }
            }
            (None, Some(cloud)) => {
                if !verify_blocking(self.verifier.clone(), password, &cloud.password_hash).await {
                    return Err(LoginError::Unauthorized);
                }
                self.local
                    .insert_identity(&cloud)
                    .await
                    .map_err(LoginError::TransientIo)?;
                tracing::info!(identity_id = %cloud.id, "Adopted cloud identity onto this device");
                SessionIdentity {
                    id: cloud.id.clone(),
                    identity: cloud,
                    adopted: true,
                }
            }
        };

        self.session
            .save(&resolved.id)
            .await
            .map_err(LoginError::TransientIo)?;

        tracing::info!(identity_id = %resolved.id, adopted = resolved.adopted, "Logged in");
        Ok(resolved)
    }

    async fn lookup_local(&self, email: &str) -> Option<Identity> {
        match self.local.get_identity_by_email(email).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "Local identity lookup failed, treating as absent");
                None
            }
        }
    }

    async fn lookup_cloud(&self, email: &str) -> Option<Identity> {
        match timed(self.timeout, self.cloud.get_identity_by_email(email)).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "Cloud identity lookup failed, treating as absent");
                None
            }
        }
    }

    async fn remove_orphan(&self, local: &Identity) {
        tracing::info!(identity_id = %local.id, "Identity missing from cloud, removing local copy");
        if let Err(e) = self.local.delete_identity(&local.id).await {
            tracing::warn!(identity_id = %local.id, error = %e, "Failed to remove orphaned identity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::MemoryCloudStore;
    use crate::credentials::Pbkdf2Verifier;
    use crate::session::MemorySessionStore;
    use crate::sync::ErrorKind;

    struct Fixture {
        local: Arc<MemoryCloudStore>,
        cloud: Arc<MemoryCloudStore>,
        session: Arc<MemorySessionStore>,
        verifier: Arc<Pbkdf2Verifier>,
        reconciler: IdentityReconciler,
    }

    fn setup() -> Fixture {
        let local = Arc::new(MemoryCloudStore::new());
        let cloud = Arc::new(MemoryCloudStore::new());
        let session = Arc::new(MemorySessionStore::new());
        let verifier = Arc::new(Pbkdf2Verifier::with_iterations(1_000));
        let reconciler = IdentityReconciler::new(
            local.clone(),
            cloud.clone(),
            verifier.clone(),
            session.clone(),
            Duration::from_secs(5),
        );
        Fixture {
            local,
            cloud,
            session,
            verifier,
            reconciler,
        }
    }

    fn identity(f: &Fixture, email: &str, password: &str) -> Identity {
        Identity::new("user", email, f.verifier.hash(password).unwrap())
    }

    #[tokio::test]
    async fn test_both_present_uses_local_hash() {
        let f = setup();
        let id = identity(&f, "a@example.com", "local-pw");
        f.local.insert_identity(&id).await.unwrap();
        f.cloud.insert_identity(&id).await.unwrap();
        f.cloud
            .set_password_hash(&id.id, &f.verifier.hash("cloud-pw").unwrap());

        let session = f.reconciler.login("a@example.com", "local-pw").await.unwrap();
        assert_eq!(session.id, id.id);
        assert!(!session.adopted);

        let err = f
            .reconciler
            .login("a@example.com", "cloud-pw")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_cloud_only_is_adopted() {
        let f = setup();
        let id = identity(&f, "b@example.com", "pw");
        f.cloud.insert_identity(&id).await.unwrap();

        let session = f.reconciler.login("B@example.com", "pw").await.unwrap();
        assert!(session.adopted);

        let adopted = f.local.get_identity(&id.id).await.unwrap().unwrap();
        assert_eq!(adopted.email, id.email);
        assert_eq!(adopted.password_hash, id.password_hash);
        assert_eq!(adopted.created_at, id.created_at);
        assert_eq!(f.session.load().await.unwrap(), Some(id.id));
    }

    #[tokio::test]
    async fn test_cloud_only_wrong_password_not_adopted() {
        let f = setup();
        let id = identity(&f, "c@example.com", "pw");
        f.cloud.insert_identity(&id).await.unwrap();

        let err = f.reconciler.login("c@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, LoginError::Unauthorized));
        assert_eq!(f.local.identity_count(), 0);
        assert!(f.session.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_only_is_removed() {
        let f = setup();
        let id = identity(&f, "d@example.com", "pw");
        f.local.insert_identity(&id).await.unwrap();

        let err = f.reconciler.login("d@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, LoginError::NotFound { .. }));
        assert!(f.local.get_identity(&id.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_email_creates_nothing() {
        let f = setup();

        let err = f.reconciler.login("e@example.com", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(f.local.identity_count(), 0);
        assert_eq!(f.cloud.identity_count(), 0);
        assert!(f.session.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_cloud_counts_as_absent() {
        let f = setup();
        let id = identity(&f, "f@example.com", "pw");
        f.local.insert_identity(&id).await.unwrap();
        f.cloud.insert_identity(&id).await.unwrap();
        f.cloud.set_available(false);

        let err = f.reconciler.login("f@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, LoginError::NotFound { .. }));
        assert_eq!(f.local.identity_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_cloud_times_out_as_absent() {
        let local = Arc::new(MemoryCloudStore::new());
        let cloud = Arc::new(MemoryCloudStore::new());
        let verifier = Arc::new(Pbkdf2Verifier::with_iterations(1_000));
        let id = Identity::new("user", "g@example.com", verifier.hash("pw").unwrap());
        cloud.insert_identity(&id).await.unwrap();
        cloud.set_latency(Duration::from_millis(500));

        let reconciler = IdentityReconciler::new(
            local.clone(),
            cloud,
            verifier,
            Arc::new(MemorySessionStore::new()),
            Duration::from_millis(20),
        );

        let err = reconciler.login("g@example.com", "pw").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(local.identity_count(), 0);
    }
}
