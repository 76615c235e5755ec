//! In-memory cloud document store.
//!
//! Behaves like the remote store, including documents passing through JSON,
//! and can be told to go offline, fail one collection, or answer slowly.
//! Used by tests and by embedders that want a throwaway cloud.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use super::documents::IdentityDocument;
use crate::models::{normalize_email, Identity};
use crate::store::{
    validate_owner_id, Collection, IdentityStore, OwnedRecord, RecordStore, StoreError,
    StoreResult,
};

type Documents = BTreeMap<i64, serde_json::Value>;

#[derive(Debug, Default)]
struct CloudState {
    users: HashMap<String, IdentityDocument>,
    collections: HashMap<(String, Collection), Documents>,
}

#[derive(Debug)]
pub struct MemoryCloudStore {
    state: RwLock<CloudState>,
    available: AtomicBool,
    failing: RwLock<HashSet<Collection>>,
    latency_ms: AtomicU64,
}

impl MemoryCloudStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CloudState::default()),
            available: AtomicBool::new(true),
            failing: RwLock::new(HashSet::new()),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// While unavailable every call fails with `StoreError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes every call touching `collection` fail.
    pub fn fail_collection(&self, collection: Collection) {
        self.failing.write().unwrap().insert(collection);
    }

    pub fn restore_collection(&self, collection: Collection) {
        self.failing.write().unwrap().remove(&collection);
    }

    /// Delay applied before every call.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of documents under `users/{owner_id}/{collection}`.
    pub fn document_count(&self, owner_id: &str, collection: Collection) -> usize {
        self.state
            .read()
            .unwrap()
            .collections
            .get(&(owner_id.to_string(), collection))
            .map_or(0, |docs| docs.len())
    }

    /// Overwrites the stored password hash without touching anything else.
    pub fn set_password_hash(&self, id: &str, password_hash: &str) -> bool {
        match self.state.write().unwrap().users.get_mut(id) {
            Some(doc) => {
                doc.password_hash = password_hash.to_string();
                true
            }
            None => false,
        }
    }

    pub fn identity_count(&self) -> usize {
        self.state.read().unwrap().users.len()
    }

    async fn check(&self, collection: Option<Collection>) -> StoreResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        if let Some(collection) = collection {
            if self.failing.read().unwrap().contains(&collection) {
                return Err(StoreError::Remote {
                    status: 503,
                    message: format!("{} temporarily unavailable", collection),
                });
            }
        }
        Ok(())
    }
}

impl Default for MemoryCloudStore {
    fn default() -> Self {
        Self::new()
    }
}

fn email_taken(state: &CloudState, email: &str, except_id: &str) -> bool {
    state
        .users
        .values()
        .any(|doc| doc.id != except_id && normalize_email(&doc.email) == email)
}

#[async_trait]
impl IdentityStore for MemoryCloudStore {
    async fn get_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        self.check(None).await?;
        let email = normalize_email(email);

        let state = self.state.read().unwrap();
        Ok(state
            .users
            .values()
            .find(|doc| normalize_email(&doc.email) == email)
            .cloned()
            .map(Identity::from))
    }

    async fn get_identity(&self, id: &str) -> StoreResult<Option<Identity>> {
        self.check(None).await?;

        let state = self.state.read().unwrap();
        Ok(state.users.get(id).cloned().map(Identity::from))
    }

    async fn insert_identity(&self, identity: &Identity) -> StoreResult<()> {
        self.check(None).await?;
        validate_owner_id(&identity.id)?;
        let email = normalize_email(&identity.email);

        let mut state = self.state.write().unwrap();
        if state.users.contains_key(&identity.id) {
            return Err(StoreError::Conflict(identity.id.clone()));
        }
        if email_taken(&state, &email, &identity.id) {
            return Err(StoreError::DuplicateEmail(email));
        }
        state
            .users
            .insert(identity.id.clone(), IdentityDocument::from(identity));
        Ok(())
    }

    async fn update_identity(&self, identity: &Identity) -> StoreResult<()> {
        self.check(None).await?;
        validate_owner_id(&identity.id)?;
        let email = normalize_email(&identity.email);

        let mut state = self.state.write().unwrap();
        if email_taken(&state, &email, &identity.id) {
            return Err(StoreError::DuplicateEmail(email));
        }
        state
            .users
            .insert(identity.id.clone(), IdentityDocument::from(identity));
        Ok(())
    }

    async fn delete_identity(&self, id: &str) -> StoreResult<()> {
        self.check(None).await?;
        self.state.write().unwrap().users.remove(id);
        Ok(())
    }
}

#[async_trait]
impl<T: OwnedRecord> RecordStore<T> for MemoryCloudStore {
    async fn get_record(&self, owner_id: &str, id: i64) -> StoreResult<Option<T>> {
        self.check(Some(T::COLLECTION)).await?;

        let doc = self
            .state
            .read()
            .unwrap()
            .collections
            .get(&(owner_id.to_string(), T::COLLECTION))
            .and_then(|docs| docs.get(&id))
            .cloned();
        Ok(doc.map(serde_json::from_value).transpose()?)
    }

    async fn insert_record(&self, record: &T) -> StoreResult<T> {
        self.check(Some(T::COLLECTION)).await?;
        validate_owner_id(record.owner_id())?;

        let mut state = self.state.write().unwrap();
        let docs = state
            .collections
            .entry((record.owner_id().to_string(), T::COLLECTION))
            .or_default();

        let mut inserted = record.clone();
        if inserted.id() <= 0 {
            inserted.set_id(docs.keys().next_back().map_or(1, |max| max + 1));
        } else if docs.contains_key(&inserted.id()) {
            return Err(StoreError::Conflict(inserted.id().to_string()));
        }
        docs.insert(inserted.id(), serde_json::to_value(&inserted)?);
        Ok(inserted)
    }

    async fn update_record(&self, record: &T) -> StoreResult<()> {
        self.check(Some(T::COLLECTION)).await?;
        validate_owner_id(record.owner_id())?;
        let doc = serde_json::to_value(record)?;

        self.state
            .write()
            .unwrap()
            .collections
            .entry((record.owner_id().to_string(), T::COLLECTION))
            .or_default()
            .insert(record.id(), doc);
        Ok(())
    }

    async fn delete_record(&self, owner_id: &str, id: i64) -> StoreResult<()> {
        self.check(Some(T::COLLECTION)).await?;

        if let Some(docs) = self
            .state
            .write()
            .unwrap()
            .collections
            .get_mut(&(owner_id.to_string(), T::COLLECTION))
        {
            docs.remove(&id);
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<T>> {
        self.check(Some(T::COLLECTION)).await?;

        let docs: Vec<serde_json::Value> = self
            .state
            .read()
            .unwrap()
            .collections
            .get(&(owner_id.to_string(), T::COLLECTION))
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();

        docs.into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }

    async fn batch_replace(&self, owner_id: &str, records: &[T]) -> StoreResult<()> {
        self.check(Some(T::COLLECTION)).await?;
        validate_owner_id(owner_id)?;

        // Build the whole snapshot before taking the lock
        let mut snapshot = Documents::new();
        for record in records {
            if record.owner_id() != owner_id {
                return Err(StoreError::InvalidOwner(record.owner_id().to_string()));
            }
            snapshot.insert(record.id(), serde_json::to_value(record)?);
        }

        self.state
            .write()
            .unwrap()
            .collections
            .insert((owner_id.to_string(), T::COLLECTION), snapshot);
        Ok(())
    }

    async fn upsert_all(&self, records: &[T]) -> StoreResult<usize> {
        self.check(Some(T::COLLECTION)).await?;

        let mut docs = Vec::with_capacity(records.len());
        for record in records {
            validate_owner_id(record.owner_id())?;
            docs.push((
                record.owner_id().to_string(),
                record.id(),
                serde_json::to_value(record)?,
            ));
        }

        let mut state = self.state.write().unwrap();
        for (owner_id, id, doc) in docs {
            state
                .collections
                .entry((owner_id, T::COLLECTION))
                .or_default()
                .insert(id, doc);
        }
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PantryIngredient, SavedRecipe};

    #[tokio::test]
    async fn test_identity_lookup_by_email() {
        let store = MemoryCloudStore::new();
        let identity = Identity::new("alice", "alice@example.com", "s:h");
        store.insert_identity(&identity).await.unwrap();

        let found = store
            .get_identity_by_email("Alice@Example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, identity.id);
        assert!(store.get_identity_by_email("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identity_email_unique() {
        let store = MemoryCloudStore::new();
        store
            .insert_identity(&Identity::new("a", "x@example.com", "h"))
            .await
            .unwrap();

        let result = store
            .insert_identity(&Identity::new("b", "x@example.com", "h"))
            .await;
        assert!(matches!(result, Err(StoreError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_update_identity_upserts() {
        let store = MemoryCloudStore::new();
        let mut identity = Identity::new("a", "a@example.com", "h");

        store.update_identity(&identity).await.unwrap();
        identity.username = "renamed".to_string();
        store.update_identity(&identity).await.unwrap();

        let stored = store.get_identity(&identity.id).await.unwrap().unwrap();
        assert_eq!(stored.username, "renamed");
        assert_eq!(store.identity_count(), 1);
    }

    #[tokio::test]
    async fn test_batch_replace_is_exact() {
        let store = MemoryCloudStore::new();
        let first: Vec<PantryIngredient> = (1..=3)
            .map(|i| PantryIngredient::new(format!("item {}", i), "u1").with_id(i))
            .collect();
        store.batch_replace("u1", &first).await.unwrap();
        assert_eq!(store.document_count("u1", Collection::Ingredients), 3);

        store.batch_replace("u1", &first[..1]).await.unwrap();
        let listed: Vec<PantryIngredient> = store.list_by_owner("u1").await.unwrap();
        assert_eq!(listed, first[..1].to_vec());
    }

    #[tokio::test]
    async fn test_batch_replace_rejects_foreign_owner() {
        let store = MemoryCloudStore::new();
        let records = vec![PantryIngredient::new("mine", "u1").with_id(1)];
        store.batch_replace("u1", &records).await.unwrap();

        let foreign = vec![PantryIngredient::new("theirs", "u2").with_id(2)];
        let result = store.batch_replace("u1", &foreign).await;

        assert!(matches!(result, Err(StoreError::InvalidOwner(_))));
        // Untouched on failure
        assert_eq!(store.document_count("u1", Collection::Ingredients), 1);
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let store = MemoryCloudStore::new();
        store
            .batch_replace("u1", &[PantryIngredient::new("a", "u1").with_id(1)])
            .await
            .unwrap();
        store
            .batch_replace(
                "u1",
                &[SavedRecipe::new("r", "https://example.com/r", "u1").with_id(1)],
            )
            .await
            .unwrap();

        assert_eq!(store.document_count("u1", Collection::Ingredients), 1);
        assert_eq!(store.document_count("u1", Collection::Recipes), 1);
        assert_eq!(store.document_count("u2", Collection::Recipes), 0);
    }

    #[tokio::test]
    async fn test_insert_assigns_next_id() {
        let store = MemoryCloudStore::new();
        let first: PantryIngredient = store
            .insert_record(&PantryIngredient::new("a", "u1"))
            .await
            .unwrap();
        let second: PantryIngredient = store
            .insert_record(&PantryIngredient::new("b", "u1"))
            .await
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_unavailable_and_failing_collection() {
        let store = MemoryCloudStore::new();

        store.fail_collection(Collection::Recipes);
        let recipes: StoreResult<Vec<SavedRecipe>> = store.list_by_owner("u1").await;
        assert!(recipes.is_err());
        let ingredients: StoreResult<Vec<PantryIngredient>> = store.list_by_owner("u1").await;
        assert!(ingredients.is_ok());

        store.set_available(false);
        assert!(matches!(
            store.get_identity("x").await,
            Err(StoreError::Unavailable)
        ));
    }
}
