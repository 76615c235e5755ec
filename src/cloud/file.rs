//! File-backed cloud document store.
//!
//! This is the persistence behind `larder-cloud`:
//! ```text
//! <DATA_DIR>/
//!   users.json                  # identity id -> identity document
//!   users/
//!     <identity_id>/
//!       ingredients.json        # local id -> ingredient document
//!       recipes.json            # local id -> recipe document
//! ```
//!
//! Every write replaces a whole file through a temp file and a rename, so a
//! collection is always either the old snapshot or the new one.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::documents::IdentityDocument;
use crate::models::{normalize_email, Identity};
use crate::store::{
    validate_owner_id, Collection, IdentityStore, OwnedRecord, RecordStore, StoreError,
    StoreResult,
};

type UserDocuments = HashMap<String, IdentityDocument>;
type Documents = BTreeMap<i64, serde_json::Value>;

const USERS_FILE: &str = "users.json";
const USERS_DIR: &str = "users";

#[derive(Debug)]
pub struct FileCloudStore {
    data_dir: PathBuf,
    // Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileCloudStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn users_path(&self) -> PathBuf {
        self.data_dir.join(USERS_FILE)
    }

    fn collection_path(&self, owner_id: &str, collection: Collection) -> PathBuf {
        self.data_dir
            .join(USERS_DIR)
            .join(owner_id)
            .join(format!("{}.json", collection.as_str()))
    }

    async fn read_users(&self) -> StoreResult<UserDocuments> {
        read_json(&self.users_path()).await
    }

    async fn read_collection(
        &self,
        owner_id: &str,
        collection: Collection,
    ) -> StoreResult<Documents> {
        validate_owner_id(owner_id)?;
        read_json(&self.collection_path(owner_id, collection)).await
    }

    async fn write_collection(
        &self,
        owner_id: &str,
        collection: Collection,
        docs: &Documents,
    ) -> StoreResult<()> {
        write_json(&self.collection_path(owner_id, collection), docs).await
    }
}

/// Reads a JSON file; a missing file is the empty value.
async fn read_json<V: DeserializeOwned + Default>(path: &Path) -> StoreResult<V> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(V::default()),
        Err(e) => Err(io_error(path, e)),
    }
}

async fn write_json<V: Serialize>(path: &Path, value: &V) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let bytes = serde_json::to_vec_pretty(value)?;

    // Write atomically using temp file + rename
    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &bytes)
        .await
        .map_err(|e| io_error(&temp_path, e))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| io_error(path, e))?;

    Ok(())
}

fn io_error(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn email_taken(users: &UserDocuments, email: &str, except_id: &str) -> bool {
    users
        .values()
        .any(|doc| doc.id != except_id && normalize_email(&doc.email) == email)
}

#[async_trait]
impl IdentityStore for FileCloudStore {
    async fn get_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let email = normalize_email(email);
        let users = self.read_users().await?;

        Ok(users
            .into_values()
            .find(|doc| normalize_email(&doc.email) == email)
            .map(Identity::from))
    }

    async fn get_identity(&self, id: &str) -> StoreResult<Option<Identity>> {
        let mut users = self.read_users().await?;
        Ok(users.remove(id).map(Identity::from))
    }

    async fn insert_identity(&self, identity: &Identity) -> StoreResult<()> {
        validate_owner_id(&identity.id)?;
        let email = normalize_email(&identity.email);

        let _guard = self.write_lock.lock().await;
        let mut users = self.read_users().await?;
        if users.contains_key(&identity.id) {
            return Err(StoreError::Conflict(identity.id.clone()));
        }
        if email_taken(&users, &email, &identity.id) {
            return Err(StoreError::DuplicateEmail(email));
        }

        users.insert(identity.id.clone(), IdentityDocument::from(identity));
        write_json(&self.users_path(), &users).await
    }

    async fn update_identity(&self, identity: &Identity) -> StoreResult<()> {
        validate_owner_id(&identity.id)?;
        let email = normalize_email(&identity.email);

        let _guard = self.write_lock.lock().await;
        let mut users = self.read_users().await?;
        if email_taken(&users, &email, &identity.id) {
            return Err(StoreError::DuplicateEmail(email));
        }

        users.insert(identity.id.clone(), IdentityDocument::from(identity));
        write_json(&self.users_path(), &users).await
    }

    async fn delete_identity(&self, id: &str) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.read_users().await?;
        if users.remove(id).is_some() {
            write_json(&self.users_path(), &users).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: OwnedRecord> RecordStore<T> for FileCloudStore {
    async fn get_record(&self, owner_id: &str, id: i64) -> StoreResult<Option<T>> {
        let mut docs = self.read_collection(owner_id, T::COLLECTION).await?;
        Ok(docs.remove(&id).map(serde_json::from_value).transpose()?)
    }

    async fn insert_record(&self, record: &T) -> StoreResult<T> {
        let owner_id = record.owner_id();

        let _guard = self.write_lock.lock().await;
        let mut docs = self.read_collection(owner_id, T::COLLECTION).await?;

        let mut inserted = record.clone();
        if inserted.id() <= 0 {
            inserted.set_id(docs.keys().next_back().map_or(1, |max| max + 1));
        } else if docs.contains_key(&inserted.id()) {
            return Err(StoreError::Conflict(inserted.id().to_string()));
        }

        docs.insert(inserted.id(), serde_json::to_value(&inserted)?);
        self.write_collection(owner_id, T::COLLECTION, &docs).await?;
        Ok(inserted)
    }

    async fn update_record(&self, record: &T) -> StoreResult<()> {
        let owner_id = record.owner_id();

        let _guard = self.write_lock.lock().await;
        let mut docs = self.read_collection(owner_id, T::COLLECTION).await?;
        docs.insert(record.id(), serde_json::to_value(record)?);
        self.write_collection(owner_id, T::COLLECTION, &docs).await
    }

    async fn delete_record(&self, owner_id: &str, id: i64) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.read_collection(owner_id, T::COLLECTION).await?;
        if docs.remove(&id).is_some() {
            self.write_collection(owner_id, T::COLLECTION, &docs).await?;
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<T>> {
        let docs = self.read_collection(owner_id, T::COLLECTION).await?;

        docs.into_values()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }

    async fn batch_replace(&self, owner_id: &str, records: &[T]) -> StoreResult<()> {
        validate_owner_id(owner_id)?;

        let mut docs = Documents::new();
        for record in records {
            if record.owner_id() != owner_id {
                return Err(StoreError::InvalidOwner(record.owner_id().to_string()));
            }
            docs.insert(record.id(), serde_json::to_value(record)?);
        }

        let _guard = self.write_lock.lock().await;
        self.write_collection(owner_id, T::COLLECTION, &docs).await?;

        tracing::debug!(
            owner_id,
            collection = %T::COLLECTION,
            count = docs.len(),
            "Replaced collection"
        );
        Ok(())
    }

    async fn upsert_all(&self, records: &[T]) -> StoreResult<usize> {
        let mut by_owner: BTreeMap<&str, Vec<&T>> = BTreeMap::new();
        for record in records {
            validate_owner_id(record.owner_id())?;
            by_owner.entry(record.owner_id()).or_default().push(record);
        }

        let _guard = self.write_lock.lock().await;
        for (owner_id, owned) in by_owner {
            let mut docs = self.read_collection(owner_id, T::COLLECTION).await?;
            for record in owned {
                docs.insert(record.id(), serde_json::to_value(record)?);
            }
            self.write_collection(owner_id, T::COLLECTION, &docs).await?;
        }
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PantryIngredient, SavedRecipe};
    use tempfile::TempDir;

    fn setup() -> (FileCloudStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileCloudStore::new(temp_dir.path());
        (store, temp_dir)
    }

    fn ingredients(owner: &str, ids: &[i64]) -> Vec<PantryIngredient> {
        ids.iter()
            .map(|id| PantryIngredient::new(format!("item {}", id), owner).with_id(*id))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_files_read_as_empty() {
        let (store, _temp) = setup();

        assert!(store.get_identity("nobody").await.unwrap().is_none());
        let listed: Vec<SavedRecipe> = store.list_by_owner("nobody").await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_identity_survives_reopen() {
        let (store, temp) = setup();
        let identity = Identity::new("alice", "alice@example.com", "s:h");
        store.insert_identity(&identity).await.unwrap();

        let reopened = FileCloudStore::new(temp.path());
        let found = reopened
            .get_identity_by_email("ALICE@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, identity.id);
        assert_eq!(found.password_hash, "s:h");
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (store, _temp) = setup();
        store
            .insert_identity(&Identity::new("a", "dup@example.com", "h"))
            .await
            .unwrap();

        let other = Identity::new("b", "dup@example.com", "h");
        assert!(matches!(
            store.update_identity(&other).await,
            Err(StoreError::DuplicateEmail(_))
        ));
    }

    #[tokio::test]
    async fn test_fractional_values_survive_exactly() {
        let (store, _temp) = setup();
        let items: Vec<PantryIngredient> = (1..=200)
            .map(|n| {
                PantryIngredient::new(format!("item {}", n), "u1")
                    .with_id(n)
                    .with_quantity(n as f64 / 11.0, "g")
            })
            .collect();
        let recipe = SavedRecipe::new("Soup", "https://example.com/soup", "u1")
            .with_id(1)
            .with_calories(1.0 / 3.0);

        RecordStore::<PantryIngredient>::batch_replace(&store, "u1", &items)
            .await
            .unwrap();
        RecordStore::<SavedRecipe>::batch_replace(&store, "u1", &[recipe.clone()])
            .await
            .unwrap();

        let listed: Vec<PantryIngredient> = store.list_by_owner("u1").await.unwrap();
        assert_eq!(listed.len(), items.len());
        for (got, want) in listed.iter().zip(&items) {
            assert_eq!(got.quantity.to_bits(), want.quantity.to_bits(), "{}", want.name);
        }
        let recipes: Vec<SavedRecipe> = store.list_by_owner("u1").await.unwrap();
        assert_eq!(recipes[0].calories.to_bits(), recipe.calories.to_bits());
    }

    #[tokio::test]
    async fn test_batch_replace_layout_and_exactness() {
        let (store, temp) = setup();

        store
            .batch_replace("u1", &ingredients("u1", &[1, 2, 3]))
            .await
            .unwrap();
        let expected_path = temp
            .path()
            .join("users")
            .join("u1")
            .join("ingredients.json");
        assert!(expected_path.exists());

        store
            .batch_replace("u1", &ingredients("u1", &[1, 3]))
            .await
            .unwrap();
        let listed: Vec<PantryIngredient> = store.list_by_owner("u1").await.unwrap();
        let ids: Vec<i64> = listed.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3]);

        store
            .batch_replace("u1", &Vec::<PantryIngredient>::new())
            .await
            .unwrap();
        let listed: Vec<PantryIngredient> = store.list_by_owner("u1").await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_owner_paths_are_validated() {
        let (store, _temp) = setup();

        let result: StoreResult<Vec<PantryIngredient>> = store.list_by_owner("../evil").await;
        assert!(matches!(result, Err(StoreError::InvalidOwner(_))));

        let result = store.batch_replace("", &ingredients("", &[1])).await;
        assert!(matches!(result, Err(StoreError::InvalidOwner(_))));
    }

    #[tokio::test]
    async fn test_upsert_all_keeps_other_documents() {
        let (store, _temp) = setup();
        store
            .batch_replace("u1", &ingredients("u1", &[1, 2]))
            .await
            .unwrap();

        let changed = vec![PantryIngredient::new("renamed", "u1").with_id(2)];
        assert_eq!(store.upsert_all(&changed).await.unwrap(), 1);

        let listed: Vec<PantryIngredient> = store.list_by_owner("u1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].name, "renamed");
    }

    #[tokio::test]
    async fn test_record_crud() {
        let (store, _temp) = setup();
        let recipe = SavedRecipe::new("Soup", "https://example.com/soup", "u1");

        let inserted: SavedRecipe = store.insert_record(&recipe).await.unwrap();
        assert_eq!(inserted.id, 1);

        let fetched: Option<SavedRecipe> = store.get_record("u1", 1).await.unwrap();
        assert_eq!(fetched.unwrap().label, "Soup");

        RecordStore::<SavedRecipe>::delete_record(&store, "u1", 1)
            .await
            .unwrap();
        let fetched: Option<SavedRecipe> = store.get_record("u1", 1).await.unwrap();
        assert!(fetched.is_none());
    }
}
