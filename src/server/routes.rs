//! HTTP routes over a cloud store.
//!
//! - `GET  /health` (no auth)
//! - `GET  /users?email=<email>`, `POST /users`
//! - `GET|PUT|DELETE /users/{id}`
//! - `GET|PUT|POST|PATCH /users/{id}/{collection}`
//! - `GET|PUT|DELETE /users/{id}/{collection}/{local_id}`

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::auth::require_api_key;
use super::error::ApiError;
use crate::cloud::{IdentityDocument, UpsertResponse};
use crate::models::Identity;
use crate::store::{Collection, OwnedRecord, RecordStore, Stores};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub api_key: Option<Arc<str>>,
}

pub fn router(stores: Stores, api_key: Option<String>) -> Router {
    let state = AppState {
        stores,
        api_key: api_key.map(Arc::from),
    };

    // Public routes (no auth)
    let public_routes = Router::new().route("/health", get(health));

    // Protected routes (auth required when a key is set)
    let protected_routes = Router::new()
        .route("/users", get(find_user).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(put_user).delete(delete_user),
        )
        .route(
            "/users/{id}/{collection}",
            get(list_records)
                .put(replace_records)
                .post(insert_record)
                .patch(upsert_records),
        )
        .route(
            "/users/{id}/{collection}/{local_id}",
            get(get_record).put(put_record).delete(delete_record),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Identities
// ============================================================================

#[derive(Deserialize)]
struct EmailQuery {
    email: String,
}

async fn find_user(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<IdentityDocument>, ApiError> {
    state
        .stores
        .identities
        .get_identity_by_email(&query.email)
        .await?
        .map(|identity| Json(IdentityDocument::from(&identity)))
        .ok_or_else(|| ApiError::NotFound(format!("No user with email {}", query.email)))
}

async fn create_user(
    State(state): State<AppState>,
    Json(doc): Json<IdentityDocument>,
) -> Result<StatusCode, ApiError> {
    let identity = Identity::from(doc);
    state.stores.identities.insert_identity(&identity).await?;

    tracing::info!(identity_id = %identity.id, "Created user");
    Ok(StatusCode::CREATED)
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IdentityDocument>, ApiError> {
    state
        .stores
        .identities
        .get_identity(&id)
        .await?
        .map(|identity| Json(IdentityDocument::from(&identity)))
        .ok_or_else(|| ApiError::NotFound(format!("No user {}", id)))
}

async fn put_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(doc): Json<IdentityDocument>,
) -> Result<StatusCode, ApiError> {
    if doc.id != id {
        return Err(ApiError::BadRequest(format!(
            "Document id '{}' does not match path '{}'",
            doc.id, id
        )));
    }

    state
        .stores
        .identities
        .update_identity(&Identity::from(doc))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.stores.identities.delete_identity(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Owner-scoped collections
// ============================================================================

fn parse_collection(name: &str) -> Result<Collection, ApiError> {
    Collection::parse(name).ok_or_else(|| ApiError::NotFound(format!("Unknown collection: {}", name)))
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn check_owner<T: OwnedRecord>(owner_id: &str, record: &T) -> Result<(), ApiError> {
    if record.owner_id() != owner_id {
        return Err(ApiError::BadRequest(format!(
            "Record owner '{}' does not match path '{}'",
            record.owner_id(),
            owner_id
        )));
    }
    Ok(())
}

/// Runs `$body` with `$store` bound to the record store for `$collection`.
macro_rules! with_collection {
    ($state:expr, $collection:expr, |$store:ident| $body:expr) => {
        match parse_collection(&$collection)? {
            Collection::Ingredients => {
                let $store = &*$state.stores.ingredients;
                $body
            }
            Collection::Recipes => {
                let $store = &*$state.stores.recipes;
                $body
            }
        }
    };
}

async fn list_records(
    State(state): State<AppState>,
    Path((id, collection)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    with_collection!(state, collection, |store| list_in(store, &id).await)
}

async fn replace_records(
    State(state): State<AppState>,
    Path((id, collection)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    with_collection!(state, collection, |store| replace_in(store, &id, body).await)
}

async fn insert_record(
    State(state): State<AppState>,
    Path((id, collection)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    with_collection!(state, collection, |store| insert_in(store, &id, body).await)
}

async fn upsert_records(
    State(state): State<AppState>,
    Path((id, collection)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    with_collection!(state, collection, |store| upsert_in(store, &id, body).await)
}

async fn get_record(
    State(state): State<AppState>,
    Path((id, collection, local_id)): Path<(String, String, i64)>,
) -> Result<Response, ApiError> {
    with_collection!(state, collection, |store| get_in(store, &id, local_id).await)
}

async fn put_record(
    State(state): State<AppState>,
    Path((id, collection, local_id)): Path<(String, String, i64)>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    with_collection!(state, collection, |store| put_in(store, &id, local_id, body).await)
}

async fn delete_record(
    State(state): State<AppState>,
    Path((id, collection, local_id)): Path<(String, String, i64)>,
) -> Result<Response, ApiError> {
    with_collection!(state, collection, |store| {
        store.delete_record(&id, local_id).await?;
        Ok(StatusCode::NO_CONTENT.into_response())
    })
}

async fn list_in<T: OwnedRecord>(
    store: &dyn RecordStore<T>,
    owner_id: &str,
) -> Result<Response, ApiError> {
    let records = store.list_by_owner(owner_id).await?;
    Ok(Json(records).into_response())
}

async fn replace_in<T: OwnedRecord>(
    store: &dyn RecordStore<T>,
    owner_id: &str,
    body: Value,
) -> Result<Response, ApiError> {
    let records: Vec<T> = decode(body)?;
    store.batch_replace(owner_id, &records).await?;

    tracing::info!(owner_id, collection = %T::COLLECTION, count = records.len(), "Replaced collection");
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn insert_in<T: OwnedRecord>(
    store: &dyn RecordStore<T>,
    owner_id: &str,
    body: Value,
) -> Result<Response, ApiError> {
    let record: T = decode(body)?;
    check_owner(owner_id, &record)?;

    let inserted = store.insert_record(&record).await?;
    Ok((StatusCode::CREATED, Json(inserted)).into_response())
}

async fn upsert_in<T: OwnedRecord>(
    store: &dyn RecordStore<T>,
    owner_id: &str,
    body: Value,
) -> Result<Response, ApiError> {
    let records: Vec<T> = decode(body)?;
    for record in &records {
        check_owner(owner_id, record)?;
    }

    let written = store.upsert_all(&records).await?;
    Ok(Json(UpsertResponse { written }).into_response())
}

async fn get_in<T: OwnedRecord>(
    store: &dyn RecordStore<T>,
    owner_id: &str,
    local_id: i64,
) -> Result<Response, ApiError> {
    match store.get_record(owner_id, local_id).await? {
        Some(record) => Ok(Json(record).into_response()),
        None => Err(ApiError::NotFound(format!(
            "No {} document {}",
            T::COLLECTION,
            local_id
        ))),
    }
}

async fn put_in<T: OwnedRecord>(
    store: &dyn RecordStore<T>,
    owner_id: &str,
    local_id: i64,
    body: Value,
) -> Result<Response, ApiError> {
    let record: T = decode(body)?;
    check_owner(owner_id, &record)?;
    if record.id() != local_id {
        return Err(ApiError::BadRequest(format!(
            "Document id {} does not match path {}",
            record.id(),
            local_id
        )));
    }

    store.update_record(&record).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::MemoryCloudStore;
    use crate::models::PantryIngredient;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(api_key: Option<&str>) -> (Router, Arc<MemoryCloudStore>) {
        let store = Arc::new(MemoryCloudStore::new());
        let app = router(
            Stores::from_shared(store.clone()),
            api_key.map(str::to_string),
        );
        (app, store)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_auth() {
        let (app, _) = test_app(Some("secret"));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn missing_key_returns_401() {
        let (app, _) = test_app(Some("secret"));

        let response = app
            .oneshot(Request::get("/users/u1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["kind"], "unauthorized");
    }

    #[tokio::test]
    async fn wrong_key_returns_401() {
        let (app, _) = test_app(Some("secret"));

        let response = app
            .oneshot(
                Request::get("/users/u1")
                    .header("Authorization", "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn same_length_wrong_key_returns_401() {
        let (app, _) = test_app(Some("secret"));

        let response = app
            .oneshot(
                Request::get("/users/u1")
                    .header("Authorization", "Bearer secreT")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_key_reaches_handler() {
        let (app, _) = test_app(Some("secret"));

        let response = app
            .oneshot(
                Request::get("/users/u1")
                    .header("Authorization", "Bearer secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_lookup_by_email() {
        let (app, store) = test_app(None);
        let identity = Identity::new("ann", "ann@example.com", "s:h");
        crate::store::IdentityStore::insert_identity(&*store, &identity)
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::get("/users?email=ANN%40example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["id"], identity.id.as_str());
        assert_eq!(json["passwordHash"], "s:h");
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let (app, _) = test_app(None);
        let doc = serde_json::to_value(IdentityDocument::from(&Identity::new(
            "a",
            "dup@example.com",
            "h",
        )))
        .unwrap();
        let other = serde_json::to_value(IdentityDocument::from(&Identity::new(
            "b",
            "dup@example.com",
            "h",
        )))
        .unwrap();

        let first = app
            .clone()
            .oneshot(json_request("POST", "/users", doc))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(json_request("POST", "/users", other))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["kind"], "duplicate_email");
    }

    #[tokio::test]
    async fn replace_collection_is_exact() {
        let (app, store) = test_app(None);
        let items = vec![
            PantryIngredient::new("a", "u1").with_id(1),
            PantryIngredient::new("b", "u1").with_id(2),
        ];

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/users/u1/ingredients",
                serde_json::to_value(&items).unwrap(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(store.document_count("u1", Collection::Ingredients), 2);

        let response = app
            .oneshot(json_request("PUT", "/users/u1/ingredients", Value::Array(vec![])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(store.document_count("u1", Collection::Ingredients), 0);
    }

    #[tokio::test]
    async fn unknown_collection_is_404() {
        let (app, _) = test_app(None);

        let response = app
            .oneshot(Request::get("/users/u1/shopping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn record_owner_must_match_path() {
        let (app, _) = test_app(None);
        let item = PantryIngredient::new("a", "u2").with_id(1);

        let response = app
            .oneshot(json_request(
                "PUT",
                "/users/u1/ingredients/1",
                serde_json::to_value(&item).unwrap(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn insert_assigns_id() {
        let (app, _) = test_app(None);
        let item = PantryIngredient::new("a", "u1");

        let response = app
            .oneshot(json_request(
                "POST",
                "/users/u1/ingredients",
                serde_json::to_value(&item).unwrap(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["id"], 1);
    }
}
