//! Asynchronous deletion with callback completion.
//!
//! ```text
//! Initiated ──register──→ send delete ──→ AwaitingCallback ──→ Completed
//!     │                       │                 │          ├──→ Failed (remote status)
//!     │                       └─ send error ────┼──────────┴──→ Failed (cancel entry)
//!     │                                         ├─ timeout ────→ TimedOut
//!     └─ shutdown ──────────────────────────────┴─ shutdown ───→ Cancelled
//! ```
//!
//! The registry entry always exists before the request is sent and never
//! outlives the call. Failed deletions are not retried here; the next
//! cleanup pass picks the entity up again.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use sweeper_core::{
    CallbackOutcome, CallbackRegistry, DeleteOperationResult, DeletionError, EntityKind,
    OrchestratorClient,
};
use tokio::sync::watch;

/// Lifecycle of a single deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletionState {
    Initiated,
    AwaitingCallback,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl DeletionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeletionState::Initiated | DeletionState::AwaitingCallback)
    }

    /// Terminal state reached by a deletion that returned `result`.
    pub fn from_result(result: &Result<(), DeletionError>) -> Self {
        match result {
            Ok(()) => DeletionState::Completed,
            Err(DeletionError::TimedOut { .. }) => DeletionState::TimedOut,
            Err(DeletionError::Cancelled { .. }) => DeletionState::Cancelled,
            Err(_) => DeletionState::Failed,
        }
    }
}

impl fmt::Display for DeletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeletionState::Initiated => "initiated",
            DeletionState::AwaitingCallback => "awaiting_callback",
            DeletionState::Completed => "completed",
            DeletionState::Failed => "failed",
            DeletionState::Cancelled => "cancelled",
            DeletionState::TimedOut => "timed_out",
        };
        write!(f, "{}", s)
    }
}

/// Build the URL the orchestrator POSTs the delete result to.
pub fn callback_url(application_url: &str, kind: EntityKind, id: &str) -> String {
    format!(
        "{}/callbacks/delete/{}/{}",
        application_url.trim_end_matches('/'),
        kind.path_segment(),
        urlencoding::encode(id)
    )
}

/// Deletes one entity kind through the orchestrator and waits for the callback.
pub struct AsyncDeletionWorker {
    kind: EntityKind,
    orchestrator: Arc<dyn OrchestratorClient>,
    registry: Arc<CallbackRegistry<DeleteOperationResult>>,
    application_url: String,
    timeout: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl AsyncDeletionWorker {
    pub fn new(
        kind: EntityKind,
        orchestrator: Arc<dyn OrchestratorClient>,
        registry: Arc<CallbackRegistry<DeleteOperationResult>>,
        application_url: impl Into<String>,
        timeout: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            kind,
            orchestrator,
            registry,
            application_url: application_url.into(),
            timeout,
            shutdown_rx,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Delete `id` and wait for the orchestrator to report the outcome.
    ///
    /// Returns `Ok(())` only when the callback reported success.
    pub async fn delete_one(&self, id: &str) -> Result<(), DeletionError> {
        let result = self.run(id).await;
        let state = DeletionState::from_result(&result);
        match &result {
            Ok(()) => tracing::info!(kind = %self.kind, id = %id, state = %state, "Deletion finished"),
            Err(e) => tracing::warn!(kind = %self.kind, id = %id, state = %state, error = %e, "Deletion did not complete"),
        }
        result
    }

    async fn run(&self, id: &str) -> Result<(), DeletionError> {
        let mut shutdown_rx = self.shutdown_rx.clone();
        if *shutdown_rx.borrow() {
            return Err(self.cancelled(id));
        }

        // Initiated: the slot must exist before the orchestrator can call back.
        self.registry
            .register(id)
            .map_err(|source| DeletionError::Registry {
                kind: self.kind,
                id: id.to_string(),
                source,
            })?;
        tracing::debug!(kind = %self.kind, id = %id, state = %DeletionState::Initiated, "Deletion registered");

        let url = callback_url(&self.application_url, self.kind, id);
        if let Err(source) = self.orchestrator.delete(self.kind, id, &url).await {
            self.registry.cancel(id);
            return Err(DeletionError::SendFailed {
                kind: self.kind,
                id: id.to_string(),
                source,
            });
        }
        tracing::debug!(kind = %self.kind, id = %id, state = %DeletionState::AwaitingCallback, "Delete request accepted");

        // A result already delivered wins over a concurrent shutdown. Dropping
        // the wait on shutdown releases this registration only.
        let outcome = tokio::select! {
            biased;
            outcome = self.registry.await_completion(id, self.timeout) => outcome,
            _ = wait_for_shutdown(&mut shutdown_rx) => return Err(self.cancelled(id)),
        };

        match outcome {
            Ok(CallbackOutcome::Completed(result)) if result.is_success() => Ok(()),
            Ok(CallbackOutcome::Completed(result)) => Err(DeletionError::RemoteFailure {
                kind: self.kind,
                id: id.to_string(),
                status: result.status,
                message: result.message,
            }),
            Ok(CallbackOutcome::TimedOut) => Err(DeletionError::TimedOut {
                kind: self.kind,
                id: id.to_string(),
                timeout: self.timeout,
            }),
            Ok(CallbackOutcome::Cancelled) => Err(self.cancelled(id)),
            Err(source) => Err(DeletionError::Registry {
                kind: self.kind,
                id: id.to_string(),
                source,
            }),
        }
    }

    fn cancelled(&self, id: &str) -> DeletionError {
        DeletionError::Cancelled {
            kind: self.kind,
            id: id.to_string(),
        }
    }
}

/// Resolves once shutdown is signalled. Pends forever if the sender is gone.
async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl fmt::Debug for AsyncDeletionWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncDeletionWorker")
            .field("kind", &self.kind)
            .field("application_url", &self.application_url)
            .field("timeout", &self.timeout)
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sweeper_core::{Build, GroupBuild, RemoteError, ResultStatus, Timestamp};
    use sweeper_test_utils::{assertions, fixtures, DeleteBehavior, InMemoryOrchestrator};

    struct Harness {
        orchestrator: Arc<InMemoryOrchestrator>,
        registry: Arc<CallbackRegistry<DeleteOperationResult>>,
        shutdown_tx: watch::Sender<bool>,
        worker: AsyncDeletionWorker,
    }

    fn harness(kind: EntityKind, timeout: Duration) -> Harness {
        let orchestrator = Arc::new(InMemoryOrchestrator::new());
        let registry = Arc::new(CallbackRegistry::new());
        orchestrator.attach_callbacks(kind, registry.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = AsyncDeletionWorker::new(
            kind,
            orchestrator.clone(),
            registry.clone(),
            "http://sweeper.local/",
            timeout,
            shutdown_rx,
        );
        Harness {
            orchestrator,
            registry,
            shutdown_tx,
            worker,
        }
    }

    #[test]
    fn test_callback_url_format() {
        assert_eq!(
            callback_url("http://sweeper.local/", EntityKind::GroupBuild, "GB7"),
            "http://sweeper.local/callbacks/delete/group-builds/GB7"
        );
        assert_eq!(
            callback_url("http://sweeper.local", EntityKind::Build, "a b"),
            "http://sweeper.local/callbacks/delete/builds/a%20b"
        );
    }

    #[test]
    fn test_state_from_result() {
        assert_eq!(DeletionState::from_result(&Ok(())), DeletionState::Completed);
        let timed_out = Err(DeletionError::TimedOut {
            kind: EntityKind::Build,
            id: "1".to_string(),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(DeletionState::from_result(&timed_out), DeletionState::TimedOut);
        assert!(DeletionState::TimedOut.is_terminal());
        assert!(!DeletionState::AwaitingCallback.is_terminal());
    }

    #[tokio::test]
    async fn test_success_callback_completes() {
        let h = harness(EntityKind::Build, Duration::from_secs(5));
        assert!(h.worker.delete_one("B1").await.is_ok());

        let requests = h.orchestrator.delete_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].callback_url,
            "http://sweeper.local/callbacks/delete/builds/B1"
        );
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_is_reported() {
        let h = harness(EntityKind::Build, Duration::from_secs(5));
        h.orchestrator.set_delete_behavior(
            EntityKind::Build,
            "B2",
            DeleteBehavior::Callback(DeleteOperationResult::failure(
                "B2",
                ResultStatus::Failed,
                "artifacts in use",
            )),
        );

        let result = h.worker.delete_one("B2").await;
        assertions::assert_remote_failure(&result, ResultStatus::Failed);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_releases_entry() {
        let h = harness(EntityKind::GroupBuild, Duration::from_secs(5));
        h.orchestrator.set_delete_behavior(
            EntityKind::GroupBuild,
            "GB1",
            DeleteBehavior::Reject(fixtures::remote_failure(403, "forbidden")),
        );

        let result = h.worker.delete_one("GB1").await;
        assertions::assert_send_failed(&result, 403);
        assert!(!h.registry.is_pending("GB1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_callback_times_out() {
        let h = harness(EntityKind::GroupBuild, Duration::from_secs(30));
        h.orchestrator
            .set_delete_behavior(EntityKind::GroupBuild, "GB7", DeleteBehavior::NoCallback);

        let result = h.worker.delete_one("GB7").await;
        assertions::assert_timed_out(&result, "GB7");
        assert!(!h.registry.is_pending("GB7"));
    }

    #[tokio::test]
    async fn test_shutdown_before_start_sends_nothing() {
        let h = harness(EntityKind::Build, Duration::from_secs(5));
        h.shutdown_tx.send(true).unwrap();

        let result = h.worker.delete_one("B9").await;
        assertions::assert_cancelled(&result, "B9");
        assert!(h.orchestrator.delete_requests().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_in_flight_deletion_is_rejected() {
        let h = harness(EntityKind::Build, Duration::from_secs(5));
        h.registry.register("B5").unwrap();

        let result = h.worker.delete_one("B5").await;
        assert!(matches!(result, Err(DeletionError::Registry { .. })));
        assert!(h.orchestrator.delete_requests().is_empty());
        assert!(h.registry.is_pending("B5"));
    }

    /// Delivers a success callback and signals shutdown inside the delete call.
    struct ShutdownDuringDelete {
        registry: Arc<CallbackRegistry<DeleteOperationResult>>,
        shutdown_tx: Arc<watch::Sender<bool>>,
    }

    #[async_trait]
    impl OrchestratorClient for ShutdownDuringDelete {
        async fn unverified_builds(&self) -> Result<Vec<Build>, RemoteError> {
            Ok(Vec::new())
        }

        async fn temporary_builds_older_than(
            &self,
            _cutoff: Timestamp,
        ) -> Result<Vec<Build>, RemoteError> {
            Ok(Vec::new())
        }

        async fn temporary_group_builds_older_than(
            &self,
            _cutoff: Timestamp,
        ) -> Result<Vec<GroupBuild>, RemoteError> {
            Ok(Vec::new())
        }

        async fn add_build_attribute(
            &self,
            _build_id: &str,
            _key: &str,
            _value: &str,
        ) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn delete(
            &self,
            _kind: EntityKind,
            id: &str,
            _callback_url: &str,
        ) -> Result<(), RemoteError> {
            self.registry.resolve(id, DeleteOperationResult::success(id));
            let _ = self.shutdown_tx.send(true);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delivered_result_wins_over_shutdown() {
        let registry = Arc::new(CallbackRegistry::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let orchestrator = Arc::new(ShutdownDuringDelete {
            registry: registry.clone(),
            shutdown_tx: shutdown_tx.clone(),
        });
        let worker = AsyncDeletionWorker::new(
            EntityKind::Build,
            orchestrator,
            registry.clone(),
            "http://sweeper.local",
            Duration::from_secs(5),
            shutdown_rx,
        );

        for attempt in 0..32 {
            shutdown_tx.send_replace(false);
            let id = format!("B{}", attempt);
            assert!(worker.delete_one(&id).await.is_ok());
            assert!(registry.is_empty());
        }
    }
}
