//! Sweeper Test Utilities
//!
//! Shared test infrastructure for the sweeper workspace:
//! - In-memory orchestrator and log store implementing the collaborator traits
//! - Proptest generators for ids and checksums
//! - Fixtures for common scenarios
//! - Assertions for deletion outcomes

pub use sweeper_core::{
    Build, CallbackRegistry, DeleteOperationResult, DeletionError, EntityKind, GroupBuild,
    LogStoreClient, OrchestratorClient, RemoteError, ResultStatus, Timestamp,
    BUILD_ARCHIVED_KEY, BUILD_OUTPUT_OK_KEY,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

// ============================================================================
// IN-MEMORY ORCHESTRATOR
// ============================================================================

/// How the in-memory orchestrator reacts to a delete request.
#[derive(Debug, Clone)]
pub enum DeleteBehavior {
    /// Deliver the result to the attached registry before `delete` returns.
    Callback(DeleteOperationResult),
    /// Deliver the result from a spawned task after a delay.
    DelayedCallback(DeleteOperationResult, Duration),
    /// Accept the request and never call back.
    NoCallback,
    /// Reject the request itself.
    Reject(RemoteError),
}

/// A recorded attribute mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUpdate {
    pub build_id: String,
    pub key: String,
    pub value: String,
}

/// A recorded delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub kind: EntityKind,
    pub id: String,
    pub callback_url: String,
}

type Registry = Arc<CallbackRegistry<DeleteOperationResult>>;

/// Orchestrator double holding builds in memory.
///
/// Delete callbacks are delivered straight into the registries attached with
/// [`InMemoryOrchestrator::attach_callbacks`], standing in for the HTTP POST
/// to the callback URL.
#[derive(Debug, Default)]
pub struct InMemoryOrchestrator {
    builds: RwLock<Vec<Build>>,
    group_builds: RwLock<Vec<GroupBuild>>,
    attribute_updates: RwLock<Vec<AttributeUpdate>>,
    delete_requests: RwLock<Vec<DeleteRequest>>,
    delete_behaviors: RwLock<HashMap<(EntityKind, String), DeleteBehavior>>,
    registries: RwLock<HashMap<EntityKind, Registry>>,
    failing_attribute_ids: RwLock<Vec<String>>,
    fail_queries: AtomicBool,
    query_count: AtomicUsize,
}

impl InMemoryOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builds(builds: Vec<Build>) -> Self {
        let orchestrator = Self::new();
        *orchestrator.builds.write().unwrap() = builds;
        orchestrator
    }

    pub fn add_build(&self, build: Build) {
        self.builds.write().unwrap().push(build);
    }

    pub fn add_group_build(&self, group_build: GroupBuild) {
        self.group_builds.write().unwrap().push(group_build);
    }

    /// Route delete callbacks for `kind` into `registry`.
    pub fn attach_callbacks(&self, kind: EntityKind, registry: Registry) {
        self.registries.write().unwrap().insert(kind, registry);
    }

    /// Override the reaction to deleting one entity. The default is an
    /// immediate success callback.
    pub fn set_delete_behavior(&self, kind: EntityKind, id: &str, behavior: DeleteBehavior) {
        self.delete_behaviors
            .write()
            .unwrap()
            .insert((kind, id.to_string()), behavior);
    }

    /// Make every attribute mutation for `build_id` fail with a 500.
    pub fn fail_attribute_updates_for(&self, build_id: &str) {
        self.failing_attribute_ids
            .write()
            .unwrap()
            .push(build_id.to_string());
    }

    /// Make every listing query fail.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn attribute_updates(&self) -> Vec<AttributeUpdate> {
        self.attribute_updates.read().unwrap().clone()
    }

    pub fn delete_requests(&self) -> Vec<DeleteRequest> {
        self.delete_requests.read().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Current value of an attribute on a stored build.
    pub fn attribute(&self, build_id: &str, key: &str) -> Option<String> {
        self.builds
            .read()
            .unwrap()
            .iter()
            .find(|b| b.id == build_id)
            .and_then(|b| b.attributes.get(key).cloned())
    }

    pub fn contains_build(&self, id: &str) -> bool {
        self.builds.read().unwrap().iter().any(|b| b.id == id)
    }

    pub fn contains_group_build(&self, id: &str) -> bool {
        self.group_builds.read().unwrap().iter().any(|g| g.id == id)
    }

    fn check_queries(&self) -> Result<(), RemoteError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(RemoteError::RequestFailed {
                service: "orchestrator".to_string(),
                status: 503,
                message: "listing unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn remove_entity(&self, kind: EntityKind, id: &str) {
        match kind {
            EntityKind::Build => self.builds.write().unwrap().retain(|b| b.id != id),
            EntityKind::GroupBuild => self.group_builds.write().unwrap().retain(|g| g.id != id),
        }
    }

    fn deliver(&self, kind: EntityKind, id: &str, result: DeleteOperationResult) {
        if result.is_success() {
            self.remove_entity(kind, id);
        }
        let registry = self.registries.read().unwrap().get(&kind).cloned();
        if let Some(registry) = registry {
            registry.resolve(id, result);
        }
    }
}

#[async_trait]
impl OrchestratorClient for InMemoryOrchestrator {
    async fn unverified_builds(&self) -> Result<Vec<Build>, RemoteError> {
        self.check_queries()?;
        Ok(self
            .builds
            .read()
            .unwrap()
            .iter()
            .filter(|b| b.build_output_checksum.is_some() && !b.is_output_flagged())
            .cloned()
            .collect())
    }

    async fn temporary_builds_older_than(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<Build>, RemoteError> {
        self.check_queries()?;
        Ok(self
            .builds
            .read()
            .unwrap()
            .iter()
            .filter(|b| {
                b.temporary_build
                    && b.is_independent()
                    && b.end_time.map(|t| t < cutoff).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn temporary_group_builds_older_than(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<GroupBuild>, RemoteError> {
        self.check_queries()?;
        Ok(self
            .group_builds
            .read()
            .unwrap()
            .iter()
            .filter(|g| g.temporary_build && g.end_time.map(|t| t < cutoff).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn add_build_attribute(
        &self,
        build_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RemoteError> {
        if self
            .failing_attribute_ids
            .read()
            .unwrap()
            .iter()
            .any(|id| id == build_id)
        {
            return Err(RemoteError::RequestFailed {
                service: "orchestrator".to_string(),
                status: 500,
                message: format!("cannot set {} on {}", key, build_id),
            });
        }

        self.attribute_updates.write().unwrap().push(AttributeUpdate {
            build_id: build_id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        });
        let mut builds = self.builds.write().unwrap();
        match builds.iter_mut().find(|b| b.id == build_id) {
            Some(build) => {
                build.attributes.insert(key.to_string(), value.to_string());
                Ok(())
            }
            None => Err(RemoteError::RequestFailed {
                service: "orchestrator".to_string(),
                status: 404,
                message: format!("build {} not found", build_id),
            }),
        }
    }

    async fn delete(
        &self,
        kind: EntityKind,
        id: &str,
        callback_url: &str,
    ) -> Result<(), RemoteError> {
        self.delete_requests.write().unwrap().push(DeleteRequest {
            kind,
            id: id.to_string(),
            callback_url: callback_url.to_string(),
        });

        let behavior = self
            .delete_behaviors
            .read()
            .unwrap()
            .get(&(kind, id.to_string()))
            .cloned()
            .unwrap_or_else(|| DeleteBehavior::Callback(DeleteOperationResult::success(id)));

        match behavior {
            DeleteBehavior::Callback(result) => {
                self.deliver(kind, id, result);
                Ok(())
            }
            DeleteBehavior::DelayedCallback(result, delay) => {
                let registry = self.registries.read().unwrap().get(&kind).cloned();
                let id = id.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(registry) = registry {
                        registry.resolve(&id, result);
                    }
                });
                Ok(())
            }
            DeleteBehavior::NoCallback => Ok(()),
            DeleteBehavior::Reject(err) => Err(err),
        }
    }
}

// ============================================================================
// IN-MEMORY LOG STORE
// ============================================================================

/// Log store double returning configured digests.
///
/// Unknown build ids have no digest.
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    digests: RwLock<HashMap<String, Result<Option<String>, RemoteError>>>,
    calls: AtomicUsize,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_checksum(&self, build_id: &str, digest: &str) {
        self.digests
            .write()
            .unwrap()
            .insert(build_id.to_string(), Ok(Some(digest.to_string())));
    }

    pub fn set_missing(&self, build_id: &str) {
        self.digests
            .write()
            .unwrap()
            .insert(build_id.to_string(), Ok(None));
    }

    pub fn fail_for(&self, build_id: &str, err: RemoteError) {
        self.digests
            .write()
            .unwrap()
            .insert(build_id.to_string(), Err(err));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogStoreClient for InMemoryLogStore {
    async fn checksum(&self, build_id: &str) -> Result<Option<String>, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.digests
            .read()
            .unwrap()
            .get(build_id)
            .cloned()
            .unwrap_or(Ok(None))
    }
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for sweeper inputs.

    use proptest::prelude::*;

    /// Numeric build ids as the orchestrator hands them out.
    pub fn arb_build_id() -> impl Strategy<Value = String> {
        (1u64..10_000_000).prop_map(|n| n.to_string())
    }

    /// Lowercase hex MD5 digest.
    pub fn arb_checksum() -> impl Strategy<Value = String> {
        "[0-9a-f]{32}"
    }

    /// A retry ceiling including the degenerate 0 and 1.
    pub fn arb_ceiling() -> impl Strategy<Value = u32> {
        0u32..10
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built entities for common scenarios.

    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    /// Fixed "now" used by cleanup scenarios.
    pub fn reference_now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// A finished build carrying a checksum and no verification flag.
    pub fn unverified_build(id: &str, checksum: &str) -> Build {
        Build::new(id).with_checksum(checksum)
    }

    /// A temporary, archived build that finished `age_days` before `now`.
    pub fn archived_temporary_build(id: &str, now: Timestamp, age_days: i64) -> Build {
        Build::new(id)
            .temporary(now - ChronoDuration::days(age_days))
            .with_attribute(BUILD_ARCHIVED_KEY, "true")
    }

    /// An archived temporary build that ran inside `group_build_id`.
    pub fn grouped_temporary_build(
        id: &str,
        group_build_id: &str,
        now: Timestamp,
        age_days: i64,
    ) -> Build {
        archived_temporary_build(id, now, age_days).in_group_build(group_build_id)
    }

    /// A temporary build without the archival marker.
    pub fn unarchived_temporary_build(id: &str, now: Timestamp, age_days: i64) -> Build {
        Build::new(id).temporary(now - ChronoDuration::days(age_days))
    }

    /// A temporary group build that finished `age_days` before `now`.
    pub fn temporary_group_build(id: &str, now: Timestamp, age_days: i64) -> GroupBuild {
        GroupBuild::temporary(id, now - ChronoDuration::days(age_days))
    }

    /// Orchestrator rejection with an HTTP-like status.
    pub fn remote_failure(status: u16, message: &str) -> RemoteError {
        RemoteError::RequestFailed {
            service: "orchestrator".to_string(),
            status,
            message: message.to_string(),
        }
    }

    /// Log store transport failure.
    pub fn log_store_down() -> RemoteError {
        RemoteError::Transport {
            service: "log-store".to_string(),
            reason: "connection refused".to_string(),
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for deletion outcomes.

    use super::*;

    pub fn assert_timed_out(result: &Result<(), DeletionError>, expected_id: &str) {
        match result {
            Err(DeletionError::TimedOut { id, .. }) => assert_eq!(id, expected_id),
            other => panic!("Expected TimedOut for {}, got {:?}", expected_id, other),
        }
    }

    pub fn assert_cancelled(result: &Result<(), DeletionError>, expected_id: &str) {
        match result {
            Err(DeletionError::Cancelled { id, .. }) => assert_eq!(id, expected_id),
            other => panic!("Expected Cancelled for {}, got {:?}", expected_id, other),
        }
    }

    pub fn assert_send_failed(result: &Result<(), DeletionError>, expected_status: u16) {
        match result {
            Err(DeletionError::SendFailed { source, .. }) => {
                assert_eq!(source.status(), Some(expected_status))
            }
            other => panic!("Expected SendFailed, got {:?}", other),
        }
    }

    pub fn assert_remote_failure(result: &Result<(), DeletionError>, expected: ResultStatus) {
        match result {
            Err(DeletionError::RemoteFailure { status, .. }) => {
                assert_eq!(*status, Some(expected))
            }
            other => panic!("Expected RemoteFailure({:?}), got {:?}", expected, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unverified_builds_exclude_flagged() {
        let orchestrator = InMemoryOrchestrator::with_builds(vec![
            fixtures::unverified_build("1", "abc"),
            Build::new("2"),
            fixtures::unverified_build("3", "def").with_attribute(BUILD_OUTPUT_OK_KEY, "true"),
        ]);
        let builds = orchestrator.unverified_builds().await.unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].id, "1");
    }

    #[tokio::test]
    async fn test_immediate_callback_resolves_registry() {
        let orchestrator = InMemoryOrchestrator::new();
        let registry: Registry = Arc::new(CallbackRegistry::new());
        orchestrator.attach_callbacks(EntityKind::Build, registry.clone());

        registry.register("7").unwrap();
        orchestrator
            .delete(EntityKind::Build, "7", "http://agent/callbacks/delete/builds/7")
            .await
            .unwrap();

        let outcome = registry
            .await_completion("7", Duration::from_millis(10))
            .await
            .unwrap();
        assert!(outcome.is_completed());
        assert_eq!(orchestrator.delete_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_log_store_defaults_to_missing() {
        let store = InMemoryLogStore::new();
        store.set_checksum("1", "abc");
        assert_eq!(store.checksum("1").await.unwrap().as_deref(), Some("abc"));
        assert_eq!(store.checksum("2").await.unwrap(), None);
        assert_eq!(store.call_count(), 2);
    }
}
