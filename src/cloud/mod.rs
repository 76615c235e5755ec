//! Cloud document store adapters.
//!
//! Documents live under `users/{id}` with owner-scoped sub-collections
//! `users/{id}/ingredients/{localId}` and `users/{id}/recipes/{localId}`.

pub mod documents;
pub mod file;
pub mod http;
pub mod memory;

pub use documents::IdentityDocument;
pub use file::FileCloudStore;
pub use http::{ErrorBody, HttpCloudStore, UpsertResponse};
pub use memory::MemoryCloudStore;
