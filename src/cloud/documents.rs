//! Cloud document shapes.
//!
//! Ingredient and recipe documents are the models' own serde form. The
//! identity document is narrower than the local row: it carries no profile
//! image reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Identity;

/// `users/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDocument {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub password_hash: String,
}

impl From<&Identity> for IdentityDocument {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            created_at: identity.created_at,
            password_hash: identity.password_hash.clone(),
        }
    }
}

impl From<IdentityDocument> for Identity {
    fn from(doc: IdentityDocument) -> Self {
        Identity {
            id: doc.id,
            username: doc.username,
            password_hash: doc.password_hash,
            email: doc.email,
            profile_image_ref: None,
            created_at: doc.created_at,
        }
    }
}
