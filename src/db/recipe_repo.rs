use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::SqlitePool;

use crate::models::SavedRecipe;
use crate::store::{RecordStore, StoreResult};

const INSERT_SQL: &str = r#"
    INSERT INTO saved_recipes (id, label, image_ref, url, ingredient_lines, calories, favorite, cookbook_name, owner_id, date_added)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPSERT_SQL: &str = r#"
    INSERT OR REPLACE INTO saved_recipes (id, label, image_ref, url, ingredient_lines, calories, favorite, cookbook_name, owner_id, date_added)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub struct RecipeRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RecipeRow {
    id: i64,
    label: String,
    image_ref: Option<String>,
    url: String,
    ingredient_lines: String,
    calories: f64,
    favorite: bool,
    cookbook_name: String,
    owner_id: String,
    date_added: String,
}

impl From<RecipeRow> for SavedRecipe {
    fn from(row: RecipeRow) -> Self {
        SavedRecipe {
            id: row.id,
            label: row.label,
            image_ref: row.image_ref,
            url: row.url,
            ingredient_lines: serde_json::from_str(&row.ingredient_lines).unwrap_or_default(),
            calories: row.calories,
            favorite: row.favorite,
            cookbook_name: row.cookbook_name,
            owner_id: row.owner_id,
            date_added: DateTime::parse_from_rfc3339(&row.date_added)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

fn bind_recipe<'q>(sql: &'q str, recipe: &'q SavedRecipe) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    let lines =
        serde_json::to_string(&recipe.ingredient_lines).unwrap_or_else(|_| "[]".to_string());

    sqlx::query(sql)
        .bind((recipe.id > 0).then_some(recipe.id))
        .bind(&recipe.label)
        .bind(&recipe.image_ref)
        .bind(&recipe.url)
        .bind(lines)
        .bind(recipe.calories)
        .bind(recipe.favorite)
        .bind(&recipe.cookbook_name)
        .bind(&recipe.owner_id)
        .bind(recipe.date_added.to_rfc3339())
}

impl RecipeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Whether `url` is already saved in `cookbook_name` for this owner.
    pub async fn is_saved(&self, owner_id: &str, url: &str, cookbook_name: &str) -> StoreResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM saved_recipes WHERE owner_id = ? AND url = ? AND cookbook_name = ?",
        )
        .bind(owner_id)
        .bind(url)
        .bind(cookbook_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn list_by_cookbook(
        &self,
        owner_id: &str,
        cookbook_name: &str,
    ) -> StoreResult<Vec<SavedRecipe>> {
        let rows: Vec<RecipeRow> = sqlx::query_as(
            "SELECT * FROM saved_recipes WHERE owner_id = ? AND cookbook_name = ? ORDER BY date_added DESC, id",
        )
        .bind(owner_id)
        .bind(cookbook_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SavedRecipe::from).collect())
    }

    /// Distinct cookbook names, alphabetically.
    pub async fn cookbooks(&self, owner_id: &str) -> StoreResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT cookbook_name FROM saved_recipes WHERE owner_id = ? ORDER BY cookbook_name",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    pub async fn toggle_favorite(&self, owner_id: &str, id: i64) -> StoreResult<Option<bool>> {
        let row: Option<(bool,)> = sqlx::query_as(
            "UPDATE saved_recipes SET favorite = NOT favorite WHERE id = ? AND owner_id = ? RETURNING favorite",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(favorite,)| favorite))
    }
}

#[async_trait]
impl RecordStore<SavedRecipe> for RecipeRepository {
    async fn get_record(&self, owner_id: &str, id: i64) -> StoreResult<Option<SavedRecipe>> {
        let row: Option<RecipeRow> =
            sqlx::query_as("SELECT * FROM saved_recipes WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(SavedRecipe::from))
    }

    async fn insert_record(&self, record: &SavedRecipe) -> StoreResult<SavedRecipe> {
        let result = bind_recipe(INSERT_SQL, record).execute(&self.pool).await?;

        let mut inserted = record.clone();
        inserted.id = result.last_insert_rowid();
        Ok(inserted)
    }

    async fn update_record(&self, record: &SavedRecipe) -> StoreResult<()> {
        let lines =
            serde_json::to_string(&record.ingredient_lines).unwrap_or_else(|_| "[]".to_string());

        let done = sqlx::query(
            r#"
            UPDATE saved_recipes
            SET label = ?, image_ref = ?, url = ?, ingredient_lines = ?, calories = ?,
                favorite = ?, cookbook_name = ?
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(&record.label)
        .bind(&record.image_ref)
        .bind(&record.url)
        .bind(lines)
        .bind(record.calories)
        .bind(record.favorite)
        .bind(&record.cookbook_name)
        .bind(record.id)
        .bind(&record.owner_id)
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }
        Ok(())
    }

    async fn delete_record(&self, owner_id: &str, id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM saved_recipes WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<SavedRecipe>> {
        let rows: Vec<RecipeRow> =
            sqlx::query_as("SELECT * FROM saved_recipes WHERE owner_id = ? ORDER BY id")
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(SavedRecipe::from).collect())
    }

    async fn batch_replace(&self, owner_id: &str, records: &[SavedRecipe]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM saved_recipes WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        for record in records {
            let mut owned = record.clone();
            owned.owner_id = owner_id.to_string();
            bind_recipe(UPSERT_SQL, &owned).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_all(&self, records: &[SavedRecipe]) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            bind_recipe(UPSERT_SQL, record).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }
}
