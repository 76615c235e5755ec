use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};
use sqlx::SqlitePool;

use crate::models::PantryIngredient;
use crate::store::{RecordStore, StoreResult};

const INSERT_SQL: &str = r#"
    INSERT INTO pantry_ingredients (id, name, quantity, unit, category, image_ref, expiration_date, location, notes, favorite, owner_id)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPSERT_SQL: &str = r#"
    INSERT OR REPLACE INTO pantry_ingredients (id, name, quantity, unit, category, image_ref, expiration_date, location, notes, favorite, owner_id)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub struct IngredientRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct IngredientRow {
    id: i64,
    name: String,
    quantity: f64,
    unit: String,
    category: String,
    image_ref: Option<String>,
    expiration_date: Option<String>,
    location: String,
    notes: String,
    favorite: bool,
    owner_id: String,
}

impl From<IngredientRow> for PantryIngredient {
    fn from(row: IngredientRow) -> Self {
        PantryIngredient {
            id: row.id,
            name: row.name,
            quantity: row.quantity,
            unit: row.unit,
            category: row.category,
            image_ref: row.image_ref,
            expiration_date: row
                .expiration_date
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            location: row.location,
            notes: row.notes,
            favorite: row.favorite,
            owner_id: row.owner_id,
        }
    }
}

/// Binds every column; an id of 0 becomes NULL so SQLite assigns one.
fn bind_ingredient<'q>(
    sql: &'q str,
    item: &'q PantryIngredient,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    sqlx::query(sql)
        .bind((item.id > 0).then_some(item.id))
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(&item.category)
        .bind(&item.image_ref)
        .bind(item.expiration_date.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(&item.location)
        .bind(&item.notes)
        .bind(item.favorite)
        .bind(&item.owner_id)
}

impl IngredientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Flips the favorite flag and returns the new value.
    pub async fn toggle_favorite(&self, owner_id: &str, id: i64) -> StoreResult<Option<bool>> {
        let row: Option<(bool,)> = sqlx::query_as(
            "UPDATE pantry_ingredients SET favorite = NOT favorite WHERE id = ? AND owner_id = ? RETURNING favorite",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(favorite,)| favorite))
    }

    /// Items whose expiration date falls before `date`, soonest first.
    pub async fn expiring_before(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<PantryIngredient>> {
        let rows: Vec<IngredientRow> = sqlx::query_as(
            r#"
            SELECT * FROM pantry_ingredients
            WHERE owner_id = ? AND expiration_date IS NOT NULL AND expiration_date < ?
            ORDER BY expiration_date, name
            "#,
        )
        .bind(owner_id)
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PantryIngredient::from).collect())
    }
}

#[async_trait]
impl RecordStore<PantryIngredient> for IngredientRepository {
    async fn get_record(&self, owner_id: &str, id: i64) -> StoreResult<Option<PantryIngredient>> {
        let row: Option<IngredientRow> =
            sqlx::query_as("SELECT * FROM pantry_ingredients WHERE id = ? AND owner_id = ?")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(PantryIngredient::from))
    }

    async fn insert_record(&self, record: &PantryIngredient) -> StoreResult<PantryIngredient> {
        let result = bind_ingredient(INSERT_SQL, record)
            .execute(&self.pool)
            .await?;

        let mut inserted = record.clone();
        inserted.id = result.last_insert_rowid();
        Ok(inserted)
    }

    async fn update_record(&self, record: &PantryIngredient) -> StoreResult<()> {
        let done = sqlx::query(
            r#"
            UPDATE pantry_ingredients
            SET name = ?, quantity = ?, unit = ?, category = ?, image_ref = ?, expiration_date = ?,
                location = ?, notes = ?, favorite = ?
            WHERE id = ? AND owner_id = ?
            "#,
        )
        .bind(&record.name)
        .bind(record.quantity)
        .bind(&record.unit)
        .bind(&record.category)
        .bind(&record.image_ref)
        .bind(
            record
                .expiration_date
                .map(|d| d.format("%Y-%m-%d").to_string()),
        )
        .bind(&record.location)
        .bind(&record.notes)
        .bind(record.favorite)
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
        sqlx::query("DELETE FROM pantry_ingredients WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<PantryIngredient>> {
        let rows: Vec<IngredientRow> =
            sqlx::query_as("SELECT * FROM pantry_ingredients WHERE owner_id = ? ORDER BY id")
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(PantryIngredient::from).collect())
    }

    async fn batch_replace(&self, owner_id: &str, records: &[PantryIngredient]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM pantry_ingredients WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        for record in records {
            let mut owned = record.clone();
            owned.owner_id = owner_id.to_string();
            bind_ingredient(UPSERT_SQL, &owned)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_all(&self, records: &[PantryIngredient]) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            // Replaces whatever row holds this id, whoever owns it
            bind_ingredient(UPSERT_SQL, record)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(records.len())
    }
}
