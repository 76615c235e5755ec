//! Reconciliation and synchronization between the local cache and the cloud.
//!
//! # Flow
//!
//! - Login: [`IdentityReconciler`] decides which identity copy wins and
//!   persists the session; the [`SyncOrchestrator`] then restores both
//!   collections from the cloud.
//! - Sync: the orchestrator pushes the profile and both collections for the
//!   current session, each independently.
//!
//! Collections sync by full replace. The cloud copy of an owner's collection
//! is whatever the last push wrote; nothing is diffed.

pub mod collection;
pub mod error;
pub mod orchestrator;
pub mod reconciler;
pub mod report;

pub use collection::CollectionSynchronizer;
pub use error::{ErrorKind, LoginError, OrchestratorError, SyncError, SyncStage};
pub use orchestrator::{LoginReport, SyncOrchestrator};
pub use reconciler::{IdentityReconciler, SessionIdentity};
pub use report::{EntityKind, EntityState, EntityStatus, SyncOutcome, SyncReport};
