//! Expired temporary build cleanup.

use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use sweeper_core::{Build, GroupBuild, OrchestratorClient, Timestamp};

use super::deletion::AsyncDeletionWorker;

/// Counters for a single cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted_builds: usize,
    pub failed_builds: usize,
    /// Expired builds left alone because they were never archived.
    pub skipped_builds: usize,
    pub deleted_group_builds: usize,
    pub failed_group_builds: usize,
}

impl CleanupReport {
    pub fn failures(&self) -> usize {
        self.failed_builds + self.failed_group_builds
    }
}

/// Deletes temporary builds and group builds older than the configured lifespan.
///
/// Only independent builds are deleted one by one; builds inside a group
/// build go with their group. Builds go first, then group builds. Each entity is deleted on its own: a
/// failure is logged and counted and the pass continues.
pub struct TemporaryBuildsCleaner {
    orchestrator: Arc<dyn OrchestratorClient>,
    builds: AsyncDeletionWorker,
    group_builds: AsyncDeletionWorker,
    lifespan_days: i64,
}

impl TemporaryBuildsCleaner {
    pub fn new(
        orchestrator: Arc<dyn OrchestratorClient>,
        builds: AsyncDeletionWorker,
        group_builds: AsyncDeletionWorker,
        lifespan_days: i64,
    ) -> Self {
        Self {
            orchestrator,
            builds,
            group_builds,
            lifespan_days,
        }
    }

    /// Oldest end time a temporary entity may have and still be kept.
    pub fn cutoff(&self, now: Timestamp) -> Timestamp {
        now - ChronoDuration::days(self.lifespan_days)
    }

    pub async fn cleanup_expired(&self, now: Timestamp) -> CleanupReport {
        let cutoff = self.cutoff(now);
        let mut report = CleanupReport::default();
        tracing::info!(cutoff = %cutoff, "Deleting temporary builds older than cutoff");

        for build in self.expired_builds(cutoff, &mut report).await {
            match self.builds.delete_one(&build.id).await {
                Ok(()) => report.deleted_builds += 1,
                Err(e) => {
                    report.failed_builds += 1;
                    tracing::warn!(build_id = %build.id, error = %e, "Failed to delete temporary build");
                }
            }
        }

        for group_build in self.expired_group_builds(cutoff).await {
            match self.group_builds.delete_one(&group_build.id).await {
                Ok(()) => report.deleted_group_builds += 1,
                Err(e) => {
                    report.failed_group_builds += 1;
                    tracing::warn!(group_build_id = %group_build.id, error = %e, "Failed to delete temporary group build");
                }
            }
        }

        tracing::info!(
            deleted_builds = report.deleted_builds,
            failed_builds = report.failed_builds,
            skipped_builds = report.skipped_builds,
            deleted_group_builds = report.deleted_group_builds,
            failed_group_builds = report.failed_group_builds,
            "Temporary build cleanup finished"
        );
        report
    }

    async fn expired_builds(&self, cutoff: Timestamp, report: &mut CleanupReport) -> Vec<Build> {
        let builds = match self.orchestrator.temporary_builds_older_than(cutoff).await {
            Ok(builds) => builds,
            Err(e) => {
                tracing::warn!(status = ?e.status(), error = %e, "Querying of temporary builds failed");
                return Vec::new();
            }
        };

        builds
            .into_iter()
            .filter(|build| {
                if build.is_archived() {
                    return true;
                }
                tracing::warn!(build_id = %build.id, "Not deleting build because it is not archived");
                report.skipped_builds += 1;
                false
            })
            .collect()
    }

    async fn expired_group_builds(&self, cutoff: Timestamp) -> Vec<GroupBuild> {
        match self.orchestrator.temporary_group_builds_older_than(cutoff).await {
            Ok(group_builds) => group_builds,
            Err(e) => {
                tracing::warn!(status = ?e.status(), error = %e, "Querying of temporary group builds failed");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for TemporaryBuildsCleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryBuildsCleaner")
            .field("builds", &self.builds)
            .field("group_builds", &self.group_builds)
            .field("lifespan_days", &self.lifespan_days)
            .finish()
    }
}
