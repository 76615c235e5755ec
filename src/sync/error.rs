//! Error types for reconciliation and sync.

use crate::store::{Collection, StoreError};

/// The three failure classes surfaced by login and sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The identity does not exist where it was looked for.
    NotFound,
    /// Password mismatch.
    Unauthorized,
    /// A store or network call failed or timed out.
    TransientIo,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Unauthorized => write!(f, "unauthorized"),
            ErrorKind::TransientIo => write!(f, "transient I/O failure"),
        }
    }
}

/// Which side of a sync failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    ReadLocal,
    WriteLocal,
    ReadCloud,
    WriteCloud,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStage::ReadLocal => write!(f, "reading local"),
            SyncStage::WriteLocal => write!(f, "writing local"),
            SyncStage::ReadCloud => write!(f, "reading cloud"),
            SyncStage::WriteCloud => write!(f, "writing cloud"),
        }
    }
}

/// A push, pull or merge that did not complete.
#[derive(Debug, thiserror::Error)]
#[error("{stage} {collection} failed: {source}")]
pub struct SyncError {
    pub collection: Collection,
    pub stage: SyncStage,
    #[source]
    pub source: StoreError,
}

impl SyncError {
    pub fn new(collection: Collection, stage: SyncStage, source: StoreError) -> Self {
        Self {
            collection,
            stage,
            source,
        }
    }

    /// Every sync failure is transient from the caller's point of view.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::TransientIo
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.source, StoreError::Timeout(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("no account found for {email}")]
    NotFound { email: String },
    #[error("incorrect password")]
    Unauthorized,
    #[error("login could not be completed: {0}")]
    TransientIo(#[source] StoreError),
}

impl LoginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoginError::NotFound { .. } => ErrorKind::NotFound,
            LoginError::Unauthorized => ErrorKind::Unauthorized,
            LoginError::TransientIo(_) => ErrorKind::TransientIo,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("not logged in")]
    NoSession,
    #[error("failed to read session: {0}")]
    Session(#[source] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::new(
            Collection::Ingredients,
            SyncStage::WriteCloud,
            StoreError::Unavailable,
        );
        assert_eq!(
            err.to_string(),
            "writing cloud ingredients failed: store unavailable"
        );
        assert_eq!(err.kind(), ErrorKind::TransientIo);
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_is_transient() {
        let err = SyncError::new(
            Collection::Recipes,
            SyncStage::ReadCloud,
            StoreError::Timeout(Duration::from_secs(30)),
        );
        assert!(err.is_timeout());
        assert_eq!(err.kind(), ErrorKind::TransientIo);
    }

    #[test]
    fn test_login_error_kinds() {
        let not_found = LoginError::NotFound {
            email: "a@example.com".to_string(),
        };
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(not_found.to_string(), "no account found for a@example.com");
        assert_eq!(LoginError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            LoginError::TransientIo(StoreError::Unavailable).kind(),
            ErrorKind::TransientIo
        );
    }
}
