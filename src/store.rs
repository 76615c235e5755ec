//! Store interfaces shared by the local cache and the cloud document store.
//!
//! The reconciliation and sync code is written only against these traits, so
//! either side can be swapped for a test double. Both stores expose the same
//! shape: identity lookups by email or id, and owner-scoped record
//! collections that can be listed and replaced as a unit.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{Identity, PantryIngredient, SavedRecipe};

/// Errors raised by store adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cloud returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("store unavailable")]
    Unavailable,
    #[error("email already registered: {0}")]
    DuplicateEmail(String),
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("invalid owner id: '{0}'")]
    InvalidOwner(String),
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owner-scoped sub-collections kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Ingredients,
    Recipes,
}

impl Collection {
    /// Path segment under `users/{owner}/`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Ingredients => "ingredients",
            Collection::Recipes => "recipes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ingredients" => Some(Collection::Ingredients),
            "recipes" => Some(Collection::Recipes),
            _ => None,
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that lives in an owner-scoped collection.
pub trait OwnedRecord:
    Clone + Send + Sync + Serialize + DeserializeOwned + std::fmt::Debug + 'static
{
    const COLLECTION: Collection;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn owner_id(&self) -> &str;
}

impl OwnedRecord for PantryIngredient {
    const COLLECTION: Collection = Collection::Ingredients;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

impl OwnedRecord for SavedRecipe {
    const COLLECTION: Collection = Collection::Recipes;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Identity records, looked up by email for login and by id for sessions.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn get_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>>;

    async fn get_identity(&self, id: &str) -> StoreResult<Option<Identity>>;

    /// Fails with `DuplicateEmail` if another identity already uses the email.
    async fn insert_identity(&self, identity: &Identity) -> StoreResult<()>;

    /// The cloud treats this as an upsert; the local store requires the row.
    async fn update_identity(&self, identity: &Identity) -> StoreResult<()>;

    async fn delete_identity(&self, id: &str) -> StoreResult<()>;
}

/// An owner-scoped collection of records keyed by their integer id.
#[async_trait]
pub trait RecordStore<T: OwnedRecord>: Send + Sync {
    async fn get_record(&self, owner_id: &str, id: i64) -> StoreResult<Option<T>>;

    /// Inserts a record. An id of `0` asks the store to assign one.
    async fn insert_record(&self, record: &T) -> StoreResult<T>;

    async fn update_record(&self, record: &T) -> StoreResult<()>;

    async fn delete_record(&self, owner_id: &str, id: i64) -> StoreResult<()>;

    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<T>>;

    /// Replaces the whole collection for `owner_id` in one atomic step.
    ///
    /// Afterwards the collection holds exactly `records`, keyed by their ids.
    async fn batch_replace(&self, owner_id: &str, records: &[T]) -> StoreResult<()>;

    /// Inserts or replaces each record by id. Returns the number written.
    async fn upsert_all(&self, records: &[T]) -> StoreResult<usize>;
}

/// The three stores a device or the cloud exposes, behind trait objects.
#[derive(Clone)]
pub struct Stores {
    pub identities: Arc<dyn IdentityStore>,
    pub ingredients: Arc<dyn RecordStore<PantryIngredient>>,
    pub recipes: Arc<dyn RecordStore<SavedRecipe>>,
}

impl Stores {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        ingredients: Arc<dyn RecordStore<PantryIngredient>>,
        recipes: Arc<dyn RecordStore<SavedRecipe>>,
    ) -> Self {
        Self {
            identities,
            ingredients,
            recipes,
        }
    }

    /// Uses one adapter for all three roles.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: IdentityStore + RecordStore<PantryIngredient> + RecordStore<SavedRecipe> + 'static,
    {
        Self {
            identities: store.clone(),
            ingredients: store.clone(),
            recipes: store,
        }
    }
}

/// Rejects the shared (empty) scope and ids that would escape a path.
pub fn validate_owner_id(owner_id: &str) -> StoreResult<()> {
    if owner_id.is_empty()
        || owner_id.contains('/')
        || owner_id.contains('\\')
        || owner_id.contains("..")
        || owner_id.starts_with('.')
    {
        return Err(StoreError::InvalidOwner(owner_id.to_string()));
    }
    Ok(())
}

/// Bounds a remote call; an elapsed deadline becomes `StoreError::Timeout`.
pub async fn timed<T, F>(limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_parse() {
        assert_eq!(Collection::parse("ingredients"), Some(Collection::Ingredients));
        assert_eq!(Collection::parse("RECIPES"), Some(Collection::Recipes));
        assert_eq!(Collection::parse("users"), None);
        assert_eq!(Collection::Recipes.to_string(), "recipes");
    }

    #[test]
    fn test_validate_owner_id() {
        assert!(validate_owner_id("3f2a-user").is_ok());

        assert!(validate_owner_id("").is_err());
        assert!(validate_owner_id("../evil").is_err());
        assert!(validate_owner_id("a/b").is_err());
        assert!(validate_owner_id("a\\b").is_err());
        assert!(validate_owner_id(".hidden").is_err());
    }

    #[tokio::test]
    async fn test_timed_passes_through_result() {
        let value = timed(Duration::from_secs(1), async { Ok::<_, StoreError>(5) })
            .await
            .unwrap();
        assert_eq!(value, 5);
    }

    #[tokio::test]
    async fn test_timed_reports_timeout() {
        let result = timed(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        })
        .await;

        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
