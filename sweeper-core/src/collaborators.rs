//! Async traits for the remote services the workflows talk to.
//!
//! Production implementations are HTTP clients; tests use in-memory fakes.

use ::async_trait::async_trait;

use crate::entities::{Build, EntityKind, GroupBuild};
use crate::error::RemoteError;
use crate::Timestamp;

/// Orchestrator that owns builds and group builds.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Builds that are not running, have a checksum, and carry no
    /// `BUILD_OUTPUT_OK` attribute yet.
    async fn unverified_builds(&self) -> Result<Vec<Build>, RemoteError>;

    /// Independent temporary builds (not part of any group build) that
    /// finished before `cutoff`.
    async fn temporary_builds_older_than(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<Build>, RemoteError>;

    /// Temporary group builds that finished before `cutoff`.
    async fn temporary_group_builds_older_than(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<GroupBuild>, RemoteError>;

    // ========================================================================
    // MUTATIONS (authenticated)
    // ========================================================================

    /// Set a named attribute on a build.
    async fn add_build_attribute(
        &self,
        build_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RemoteError>;

    /// Ask for an asynchronous deletion. The result is POSTed to
    /// `callback_url` later; a successful return only means it was accepted.
    async fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        callback_url: &str,
    ) -> Result<(), RemoteError>;
}

/// Log store that can recompute a build log digest.
#[async_trait]
pub trait LogStoreClient: Send + Sync {
    /// Digest of the earliest matching build log, `None` if the store has none.
    async fn checksum(&self, build_id: &str) -> Result<Option<String>, RemoteError>;
}
