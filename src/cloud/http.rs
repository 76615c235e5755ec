//! HTTP client for a `larder-cloud` server.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::documents::IdentityDocument;
use crate::models::Identity;
use crate::store::{IdentityStore, OwnedRecord, RecordStore, StoreError, StoreResult};

/// Error body returned by the server for any non-success status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl ErrorBody {
    pub const DUPLICATE_EMAIL: &'static str = "duplicate_email";
    pub const CONFLICT: &'static str = "conflict";
    pub const INVALID_OWNER: &'static str = "invalid_owner";
    pub const NOT_FOUND: &'static str = "not_found";
    pub const UNAUTHORIZED: &'static str = "unauthorized";
    pub const BAD_REQUEST: &'static str = "bad_request";
    pub const INTERNAL: &'static str = "internal";

    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    /// Rebuilds the store error the server reported.
    fn into_store_error(self, status: StatusCode) -> StoreError {
        match self.kind.as_str() {
            Self::DUPLICATE_EMAIL => StoreError::DuplicateEmail(self.message),
            Self::CONFLICT => StoreError::Conflict(self.message),
            Self::INVALID_OWNER => StoreError::InvalidOwner(self.message),
            _ => StoreError::Remote {
                status: status.as_u16(),
                message: self.message,
            },
        }
    }
}

/// Response body for `PATCH /users/{id}/{collection}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertResponse {
    pub written: usize,
}

/// Cloud store reached over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpCloudStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpCloudStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn user_path(id: &str) -> String {
        format!("/users/{}", urlencoding::encode(id))
    }

    fn collection_path<T: OwnedRecord>(owner_id: &str) -> String {
        format!("{}/{}", Self::user_path(owner_id), T::COLLECTION.as_str())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Passes success through and turns anything else into a `StoreError`.
    async fn check(response: Response) -> StoreResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => body.into_store_error(status),
            Err(_) => StoreError::Remote {
                status: status.as_u16(),
                message: text,
            },
        })
    }

    /// Accepts a 404 only when the server itself reported `not_found`.
    ///
    /// A 404 without that body is a route miss (wrong base URL, proxy) and
    /// becomes `StoreError::Remote`.
    async fn confirm_not_found(response: Response) -> StoreResult<()> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) if body.kind == ErrorBody::NOT_FOUND => Ok(()),
            _ => Err(StoreError::Remote {
                status: status.as_u16(),
                message: text,
            }),
        }
    }

    /// GET that maps the server's `not_found` to `None`.
    async fn get_optional<V: DeserializeOwned>(&self, path: &str) -> StoreResult<Option<V>> {
        let response = self.request(Method::GET, path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            Self::confirm_not_found(response).await?;
            return Ok(None);
        }

        let response = Self::check(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn get_json<V: DeserializeOwned>(&self, path: &str) -> StoreResult<V> {
        let response = self.request(Method::GET, path).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> StoreResult<Response> {
        let response = self.request(method, path).json(body).send().await?;
        Self::check(response).await
    }

    async fn send_delete(&self, path: &str) -> StoreResult<()> {
        let response = self.request(Method::DELETE, path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Self::confirm_not_found(response).await;
        }
        Self::check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for HttpCloudStore {
    async fn get_identity_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let path = format!("/users?email={}", urlencoding::encode(email));
        let doc: Option<IdentityDocument> = self.get_optional(&path).await?;
        Ok(doc.map(Identity::from))
    }

    async fn get_identity(&self, id: &str) -> StoreResult<Option<Identity>> {
        let doc: Option<IdentityDocument> = self.get_optional(&Self::user_path(id)).await?;
        Ok(doc.map(Identity::from))
    }

    async fn insert_identity(&self, identity: &Identity) -> StoreResult<()> {
        self.send_json(Method::POST, "/users", &IdentityDocument::from(identity))
            .await?;
        Ok(())
    }

    async fn update_identity(&self, identity: &Identity) -> StoreResult<()> {
        self.send_json(
            Method::PUT,
            &Self::user_path(&identity.id),
            &IdentityDocument::from(identity),
        )
        .await?;
        Ok(())
    }

    async fn delete_identity(&self, id: &str) -> StoreResult<()> {
        self.send_delete(&Self::user_path(id)).await
    }
}

#[async_trait]
impl<T: OwnedRecord> RecordStore<T> for HttpCloudStore {
    async fn get_record(&self, owner_id: &str, id: i64) -> StoreResult<Option<T>> {
        let path = format!("{}/{}", Self::collection_path::<T>(owner_id), id);
        self.get_optional(&path).await
    }

    async fn insert_record(&self, record: &T) -> StoreResult<T> {
        let path = Self::collection_path::<T>(record.owner_id());
        let response = self.send_json(Method::POST, &path, record).await?;
        Ok(response.json().await?)
    }

    async fn update_record(&self, record: &T) -> StoreResult<()> {
        let path = format!(
            "{}/{}",
            Self::collection_path::<T>(record.owner_id()),
            record.id()
        );
        self.send_json(Method::PUT, &path, record).await?;
        Ok(())
    }

    async fn delete_record(&self, owner_id: &str, id: i64) -> StoreResult<()> {
        let path = format!("{}/{}", Self::collection_path::<T>(owner_id), id);
        self.send_delete(&path).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<T>> {
        self.get_json(&Self::collection_path::<T>(owner_id)).await
    }

    async fn batch_replace(&self, owner_id: &str, records: &[T]) -> StoreResult<()> {
        self.send_json(Method::PUT, &Self::collection_path::<T>(owner_id), records)
            .await?;
        Ok(())
    }

    async fn upsert_all(&self, records: &[T]) -> StoreResult<usize> {
        let mut by_owner: BTreeMap<&str, Vec<&T>> = BTreeMap::new();
        for record in records {
            by_owner.entry(record.owner_id()).or_default().push(record);
        }

        let mut written = 0;
        for (owner_id, owned) in by_owner {
            let response = self
                .send_json(Method::PATCH, &Self::collection_path::<T>(owner_id), &owned)
                .await?;
            let body: UpsertResponse = response.json().await?;
            written += body.written;
        }
        Ok(written)
    }
}
