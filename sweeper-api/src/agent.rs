//! Wiring of workers to collaborators and shared state.

use std::sync::Arc;
use sweeper_core::{EntityKind, LogStoreClient, OrchestratorClient};
use tokio::sync::watch;

use crate::config::AgentConfig;
use crate::state::AppState;
use crate::workers::{AsyncDeletionWorker, LogVerificationWorker, TemporaryBuildsCleaner};

/// Workers driven by the background jobs.
#[derive(Debug, Clone)]
pub struct Workers {
    pub verifier: Arc<LogVerificationWorker>,
    pub cleaner: Arc<TemporaryBuildsCleaner>,
}

/// Build the workers around the shared registries and retry ledger.
///
/// Each deletion worker waits on the registry the callback routes resolve
/// for its kind, and gives up when `shutdown_rx` flips to `true`.
pub fn build_workers(
    config: &AgentConfig,
    lifespan_days: i64,
    state: &AppState,
    orchestrator: Arc<dyn OrchestratorClient>,
    log_store: Arc<dyn LogStoreClient>,
    shutdown_rx: watch::Receiver<bool>,
) -> Workers {
    let deletion_worker = |kind: EntityKind| {
        AsyncDeletionWorker::new(
            kind,
            orchestrator.clone(),
            state.registry_for(kind).clone(),
            config.application_url.clone(),
            config.coordination.callback_timeout,
            shutdown_rx.clone(),
        )
    };

    let cleaner = TemporaryBuildsCleaner::new(
        orchestrator.clone(),
        deletion_worker(EntityKind::Build),
        deletion_worker(EntityKind::GroupBuild),
        lifespan_days,
    );

    let verifier = LogVerificationWorker::new(
        orchestrator.clone(),
        log_store,
        state.ledger.clone(),
        config.coordination.retry_ceiling,
    );

    Workers {
        verifier: Arc::new(verifier),
        cleaner: Arc::new(cleaner),
    }
}
