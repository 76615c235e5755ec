//! Full-replace push/pull for one owner-scoped collection.
//!
//! A push makes the cloud collection an exact mirror of the local one, in a
//! single atomic replace. A pull only reads; merging is a separate step so a
//! caller can inspect what came back before anything local changes.

use std::sync::Arc;
use std::time::Duration;

use super::error::{SyncError, SyncStage};
use crate::store::{timed, OwnedRecord, RecordStore, StoreError};

pub struct CollectionSynchronizer<T: OwnedRecord> {
    local: Arc<dyn RecordStore<T>>,
    cloud: Arc<dyn RecordStore<T>>,
    timeout: Duration,
}

impl<T: OwnedRecord> CollectionSynchronizer<T> {
    pub fn new(
        local: Arc<dyn RecordStore<T>>,
        cloud: Arc<dyn RecordStore<T>>,
        timeout: Duration,
    ) -> Self {
        Self {
            local,
            cloud,
            timeout,
        }
    }

    fn error(stage: SyncStage) -> impl FnOnce(StoreError) -> SyncError {
        move |source| SyncError::new(T::COLLECTION, stage, source)
    }

    /// Replaces the cloud collection with the local snapshot.
    ///
    /// Returns the number of documents now in the cloud collection.
    pub async fn push(&self, owner_id: &str) -> Result<usize, SyncError> {
        let records = self
            .local
            .list_by_owner(owner_id)
            .await
            .map_err(Self::error(SyncStage::ReadLocal))?;

        timed(self.timeout, self.cloud.batch_replace(owner_id, &records))
            .await
            .map_err(Self::error(SyncStage::WriteCloud))?;

        tracing::debug!(
            owner_id,
            collection = %T::COLLECTION,
            count = records.len(),
            "Pushed collection"
        );
        Ok(records.len())
    }

    /// Reads the cloud collection without touching the local store.
    pub async fn pull(&self, owner_id: &str) -> Result<Vec<T>, SyncError> {
        let records = timed(self.timeout, self.cloud.list_by_owner(owner_id))
            .await
            .map_err(Self::error(SyncStage::ReadCloud))?;

        tracing::debug!(
            owner_id,
            collection = %T::COLLECTION,
            count = records.len(),
            "Pulled collection"
        );
        Ok(records)
    }

    /// Upserts pulled records into the local store by id.
    ///
    /// A pulled record whose id matches an unrelated local row replaces it.
    pub async fn merge(&self, records: &[T]) -> Result<usize, SyncError> {
        if records.is_empty() {
            return Ok(0);
        }

        self.local
            .upsert_all(records)
            .await
            .map_err(Self::error(SyncStage::WriteLocal))
    }

    /// Pull followed by merge. Returns the number of records merged.
    pub async fn restore(&self, owner_id: &str) -> Result<usize, SyncError> {
        let records = self.pull(owner_id).await?;
        self.merge(&records).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::MemoryCloudStore;
    use crate::db::{init_db, IngredientRepository, RecipeRepository};
    use crate::models::{PantryIngredient, SavedRecipe};
    use crate::store::Collection;
    use crate::sync::ErrorKind;
    use tempfile::TempDir;

    async fn setup() -> (Arc<IngredientRepository>, Arc<MemoryCloudStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        (
            Arc::new(IngredientRepository::new(pool)),
            Arc::new(MemoryCloudStore::new()),
            temp_dir,
        )
    }

    fn synchronizer(
        local: &Arc<IngredientRepository>,
        cloud: &Arc<MemoryCloudStore>,
    ) -> CollectionSynchronizer<PantryIngredient> {
        CollectionSynchronizer::new(local.clone(), cloud.clone(), Duration::from_secs(5))
    }

    async fn add(local: &IngredientRepository, name: &str, owner: &str) -> PantryIngredient {
        local
            .insert_record(&PantryIngredient::new(name, owner).with_quantity(1.0, "pc"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_push_then_pull_round_trips() {
        let (local, cloud, _temp) = setup().await;
        add(&local, "Milk", "u1").await;
        add(&local, "Eggs", "u1").await;
        add(&local, "Other", "u2").await;
        let sync = synchronizer(&local, &cloud);

        assert_eq!(sync.push("u1").await.unwrap(), 2);

        let pulled = sync.pull("u1").await.unwrap();
        let snapshot = local.list_by_owner("u1").await.unwrap();
        assert_eq!(pulled, snapshot);
    }

    #[tokio::test]
    async fn test_push_replaces_not_merges() {
        let (local, cloud, _temp) = setup().await;
        let sync = synchronizer(&local, &cloud);
        let first = add(&local, "Flour", "u1").await;
        add(&local, "Sugar", "u1").await;
        add(&local, "Salt", "u1").await;

        sync.push("u1").await.unwrap();
        assert_eq!(cloud.document_count("u1", Collection::Ingredients), 3);

        local.delete_record("u1", first.id).await.unwrap();
        sync.push("u1").await.unwrap();
        assert_eq!(cloud.document_count("u1", Collection::Ingredients), 2);
    }

    #[tokio::test]
    async fn test_push_empty_clears_cloud() {
        let (local, cloud, _temp) = setup().await;
        let sync = synchronizer(&local, &cloud);
        let item = add(&local, "Rice", "u1").await;
        sync.push("u1").await.unwrap();

        local.delete_record("u1", item.id).await.unwrap();
        assert_eq!(sync.push("u1").await.unwrap(), 0);
        assert_eq!(cloud.document_count("u1", Collection::Ingredients), 0);
    }

    #[tokio::test]
    async fn test_push_is_idempotent() {
        let (local, cloud, _temp) = setup().await;
        let sync = synchronizer(&local, &cloud);
        add(&local, "Oats", "u1").await;

        sync.push("u1").await.unwrap();
        let before = sync.pull("u1").await.unwrap();
        sync.push("u1").await.unwrap();

        assert_eq!(sync.pull("u1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_pull_does_not_touch_local() {
        let (local, cloud, _temp) = setup().await;
        let remote = vec![PantryIngredient::new("Butter", "u1").with_id(7)];
        cloud.batch_replace("u1", &remote).await.unwrap();
        let sync = synchronizer(&local, &cloud);

        assert_eq!(sync.pull("u1").await.unwrap(), remote);
        assert!(local.list_by_owner("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_upserts_by_id() {
        let (local, cloud, _temp) = setup().await;
        let existing = add(&local, "Local", "u1").await;
        let remote = vec![
            PantryIngredient::new("Remote", "u1").with_id(existing.id),
            PantryIngredient::new("New", "u1").with_id(existing.id + 10),
        ];
        cloud.batch_replace("u1", &remote).await.unwrap();

        let merged = synchronizer(&local, &cloud).restore("u1").await.unwrap();
        assert_eq!(merged, 2);

        let rows = local.list_by_owner("u1").await.unwrap();
        assert_eq!(rows, remote);
    }

    #[tokio::test]
    async fn test_cloud_failure_is_transient() {
        let (local, cloud, _temp) = setup().await;
        add(&local, "Tea", "u1").await;
        cloud.set_available(false);
        let sync = synchronizer(&local, &cloud);

        let err = sync.push("u1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransientIo);
        assert_eq!(err.stage, SyncStage::WriteCloud);

        let err = sync.pull("u1").await.unwrap_err();
        assert_eq!(err.stage, SyncStage::ReadCloud);
    }

    #[tokio::test]
    async fn test_slow_cloud_times_out() {
        let (local, cloud, _temp) = setup().await;
        cloud.set_latency(Duration::from_millis(500));
        let sync: CollectionSynchronizer<PantryIngredient> =
            CollectionSynchronizer::new(local.clone(), cloud.clone(), Duration::from_millis(20));

        let err = sync.pull("u1").await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_recipes_use_their_own_collection() {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        let local = Arc::new(RecipeRepository::new(pool));
        let cloud = Arc::new(MemoryCloudStore::new());
        local
            .insert_record(&SavedRecipe::new("Stew", "https://example.com/stew", "u1"))
            .await
            .unwrap();

        let sync: CollectionSynchronizer<SavedRecipe> =
            CollectionSynchronizer::new(local, cloud.clone(), Duration::from_secs(5));
        sync.push("u1").await.unwrap();

        assert_eq!(cloud.document_count("u1", Collection::Recipes), 1);
        assert_eq!(cloud.document_count("u1", Collection::Ingredients), 0);
    }
}
