use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::is_unique_violation;
use crate::models::{normalize_email, Identity};
use crate::store::{IdentityStore, StoreError, StoreResult};

pub struct IdentityRepository {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: String,
    username: String,
    password_hash: String,
    email: String,
    profile_image_ref: Option<String>,
    created_at: String,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Identity {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            email: row.email,
            profile_image_ref: row.profile_image_ref,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

impl IdentityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl IdentityStore for IdentityRepository {
    async fn get_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let row: Option<IdentityRow> = sqlx::query_as("SELECT * FROM identities WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Identity::from))
    }

    async fn get_identity(&self, id: &str) -> StoreResult<Option<Identity>> {
        let row: Option<IdentityRow> = sqlx::query_as("SELECT * FROM identities WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Identity::from))
    }

    async fn insert_identity(&self, identity: &Identity) -> StoreResult<()> {
        let email = normalize_email(&identity.email);

        let result = sqlx::query(
            r#"
            INSERT INTO identities (id, username, password_hash, email, profile_image_ref, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(&email)
        .bind(&identity.profile_image_ref)
        .bind(identity.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                // The primary key and the email index are both unique
                if self.get_identity(&identity.id).await?.is_some() {
                    Err(StoreError::Conflict(identity.id.clone()))
                } else {
                    Err(StoreError::DuplicateEmail(email))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_identity(&self, identity: &Identity) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE identities
            SET username = ?, password_hash = ?, email = ?, profile_image_ref = ?
            WHERE id = ?
            "#,
        )
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(normalize_email(&identity.email))
        .bind(&identity.profile_image_ref)
        .bind(&identity.id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(sqlx::Error::RowNotFound.into()),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::DuplicateEmail(normalize_email(&identity.email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_identity(&self, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM identities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
