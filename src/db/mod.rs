//! The on-device relational cache.

mod identity_repo;
mod ingredient_repo;
mod recipe_repo;

pub use identity_repo::IdentityRepository;
pub use ingredient_repo::IngredientRepository;
pub use recipe_repo::RecipeRepository;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::store::Stores;

/// Initialize the database connection pool and run migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!(path = %path.display(), "Local database ready");

    Ok(pool)
}

/// Builds the local side of the sync engine from a pool.
pub fn local_stores(pool: &SqlitePool) -> Stores {
    Stores::new(
        Arc::new(IdentityRepository::new(pool.clone())),
        Arc::new(IngredientRepository::new(pool.clone())),
        Arc::new(RecipeRepository::new(pool.clone())),
    )
}

/// True when SQLite rejected a write because of a unique index.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_db_creates_tables() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("larder.db");

        let pool = init_db(&db_path).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(
            table_names,
            vec!["identities", "pantry_ingredients", "saved_recipes"]
        );
    }

    #[tokio::test]
    async fn test_init_db_is_reentrant() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("larder.db");

        let pool = init_db(&db_path).await.unwrap();
        pool.close().await;

        // Re-opening runs migrations again without error
        init_db(&db_path).await.unwrap();
    }
}
