//! Shared application state for the callback router and the jobs.

use std::sync::Arc;
use sweeper_core::{CallbackRegistry, DeleteOperationResult, EntityKind, RetryLedger};

/// Registry of pending deletions awaiting an orchestrator callback.
pub type DeleteRegistry = CallbackRegistry<DeleteOperationResult>;

/// Process-wide state shared by routes and background jobs.
///
/// Each entity kind has its own registry so a build and a group build with
/// the same id never collide.
#[derive(Clone)]
pub struct AppState {
    pub build_callbacks: Arc<DeleteRegistry>,
    pub group_build_callbacks: Arc<DeleteRegistry>,
    pub ledger: Arc<RetryLedger>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            build_callbacks: Arc::new(DeleteRegistry::new()),
            group_build_callbacks: Arc::new(DeleteRegistry::new()),
            ledger: Arc::new(RetryLedger::new()),
            start_time: std::time::Instant::now(),
        }
    }

    /// Registry that receives callbacks for `kind`.
    pub fn registry_for(&self, kind: EntityKind) -> &Arc<DeleteRegistry> {
        match kind {
            EntityKind::Build => &self.build_callbacks,
            EntityKind::GroupBuild => &self.group_build_callbacks,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pending_builds", &self.build_callbacks.len())
            .field("pending_group_builds", &self.group_build_callbacks.len())
            .field("tracked_mismatches", &self.ledger.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registries_are_separate_per_kind() {
        let state = AppState::new();
        state.registry_for(EntityKind::Build).register("42").unwrap();

        assert!(state.registry_for(EntityKind::Build).is_pending("42"));
        assert!(!state.registry_for(EntityKind::GroupBuild).is_pending("42"));
        state.registry_for(EntityKind::GroupBuild).register("42").unwrap();
        assert_eq!(state.group_build_callbacks.len(), 1);
    }
}
