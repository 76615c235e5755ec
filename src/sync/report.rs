//! Per-entity sync results and their human-readable rendering.

use super::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Profile,
    Ingredients,
    Recipes,
}

impl EntityKind {
    /// Capitalized name used at the start of a status line.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Profile => "Profile",
            EntityKind::Ingredients => "Ingredients",
            EntityKind::Recipes => "Recipes",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            EntityKind::Profile => "profile",
            EntityKind::Ingredients => "ingredients",
            EntityKind::Recipes => "recipes",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityState {
    Synced { count: usize },
    Empty,
    Failed { kind: ErrorKind, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityStatus {
    pub entity: EntityKind,
    pub state: EntityState,
}

impl EntityStatus {
    pub fn synced(entity: EntityKind, count: usize) -> Self {
        Self {
            entity,
            state: EntityState::Synced { count },
        }
    }

    pub fn empty(entity: EntityKind) -> Self {
        Self {
            entity,
            state: EntityState::Empty,
        }
    }

    pub fn failed(entity: EntityKind, kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self {
            entity,
            state: EntityState::Failed {
                kind,
                reason: reason.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, EntityState::Failed { .. })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.state, EntityState::Empty)
    }

    pub fn line(&self) -> String {
        match &self.state {
            EntityState::Synced { .. } => format!("{} synced successfully.", self.entity.label()),
            EntityState::Empty => format!("No {} to sync.", self.entity.noun()),
            EntityState::Failed { reason, .. } => {
                format!("{} sync failed: {}.", self.entity.label(), reason)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Succeeded,
    Failed,
}

/// Result of a restore or sync-to-cloud run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub statuses: Vec<EntityStatus>,
}

impl SyncReport {
    /// Succeeds only when nothing failed.
    pub fn all_succeeded(statuses: Vec<EntityStatus>) -> Self {
        let outcome = if statuses.iter().any(EntityStatus::is_failed) {
            SyncOutcome::Failed
        } else {
            SyncOutcome::Succeeded
        };
        Self { outcome, statuses }
    }

    /// Succeeds when nothing failed and at least one entity had data.
    pub fn restored(statuses: Vec<EntityStatus>) -> Self {
        let any_failed = statuses.iter().any(EntityStatus::is_failed);
        let all_empty = statuses.iter().all(EntityStatus::is_empty);
        let outcome = if any_failed || all_empty {
            SyncOutcome::Failed
        } else {
            SyncOutcome::Succeeded
        };
        Self { outcome, statuses }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == SyncOutcome::Succeeded
    }

    pub fn status(&self, entity: EntityKind) -> Option<&EntityStatus> {
        self.statuses.iter().find(|s| s.entity == entity)
    }

    /// One line per entity, in run order.
    pub fn message(&self) -> String {
        self.statuses
            .iter()
            .map(EntityStatus::line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        assert_eq!(
            EntityStatus::synced(EntityKind::Ingredients, 3).line(),
            "Ingredients synced successfully."
        );
        assert_eq!(
            EntityStatus::empty(EntityKind::Recipes).line(),
            "No recipes to sync."
        );
        assert_eq!(
            EntityStatus::failed(EntityKind::Profile, ErrorKind::TransientIo, "store unavailable")
                .line(),
            "Profile sync failed: store unavailable."
        );
    }

    #[test]
    fn test_restore_needs_some_data() {
        let report = SyncReport::restored(vec![
            EntityStatus::empty(EntityKind::Ingredients),
            EntityStatus::empty(EntityKind::Recipes),
        ]);
        assert!(!report.is_success());
        assert_eq!(report.message(), "No ingredients to sync.\nNo recipes to sync.");

        let report = SyncReport::restored(vec![
            EntityStatus::synced(EntityKind::Ingredients, 2),
            EntityStatus::empty(EntityKind::Recipes),
        ]);
        assert!(report.is_success());
    }

    #[test]
    fn test_restore_fails_if_any_type_failed() {
        let report = SyncReport::restored(vec![
            EntityStatus::synced(EntityKind::Ingredients, 2),
            EntityStatus::failed(EntityKind::Recipes, ErrorKind::TransientIo, "timed out"),
        ]);
        assert!(!report.is_success());
    }

    #[test]
    fn test_all_succeeded_allows_empty() {
        let report = SyncReport::all_succeeded(vec![
            EntityStatus::synced(EntityKind::Profile, 1),
            EntityStatus::empty(EntityKind::Ingredients),
            EntityStatus::empty(EntityKind::Recipes),
        ]);
        assert!(report.is_success());
        assert!(report.status(EntityKind::Profile).is_some());
    }
}
