//! Build output verification against the log store.
//!
//! One pass lists unverified builds, recomputes each build log digest in the
//! log store and flags the build `BUILD_OUTPUT_OK=true` on a match. A
//! mismatch only flags `false` once the retry ceiling is reached; until then
//! the build stays unflagged and is picked up again on the next pass.

use std::sync::Arc;
use sweeper_core::{
    LogStoreClient, OrchestratorClient, RetryDecision, RetryLedger, VerificationRecord,
    BUILD_OUTPUT_OK_KEY,
};

/// Counters for a single verification pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationReport {
    /// Eligible builds returned by the orchestrator.
    pub processed: usize,
    pub matched: usize,
    pub retried: usize,
    pub escalated: usize,
    /// Builds listed without a checksum.
    pub skipped: usize,
    pub fetch_errors: usize,
    pub flag_errors: usize,
}

/// Verifies build output checksums and flags the outcome on the orchestrator.
pub struct LogVerificationWorker {
    orchestrator: Arc<dyn OrchestratorClient>,
    log_store: Arc<dyn LogStoreClient>,
    ledger: Arc<RetryLedger>,
    retry_ceiling: u32,
}

impl LogVerificationWorker {
    pub fn new(
        orchestrator: Arc<dyn OrchestratorClient>,
        log_store: Arc<dyn LogStoreClient>,
        ledger: Arc<RetryLedger>,
        retry_ceiling: u32,
    ) -> Self {
        Self {
            orchestrator,
            log_store,
            ledger,
            retry_ceiling,
        }
    }

    pub fn ledger(&self) -> &RetryLedger {
        &self.ledger
    }

    /// Run one pass and return the number of builds processed.
    pub async fn run_once(&self) -> usize {
        self.run_cycle().await.processed
    }

    /// Run one pass and return the full report.
    ///
    /// Failures are isolated per build: a fetch or flag error is logged and
    /// the pass moves on to the next build.
    pub async fn run_cycle(&self) -> VerificationReport {
        let mut report = VerificationReport::default();

        tracing::info!("Verifying log checksums");
        let builds = match self.orchestrator.unverified_builds().await {
            Ok(builds) => builds,
            Err(e) => {
                tracing::error!(error = %e, "Cannot read remote builds");
                return report;
            }
        };
        tracing::info!(count = builds.len(), "Found unverified builds");
        report.processed = builds.len();

        for build in builds {
            let Some(local) = build.build_output_checksum.as_deref() else {
                tracing::warn!(build_id = %build.id, "Listed build has no checksum, skipping");
                report.skipped += 1;
                continue;
            };
            self.verify(&build.id, local, &mut report).await;
        }

        tracing::info!(
            processed = report.processed,
            matched = report.matched,
            retried = report.retried,
            escalated = report.escalated,
            fetch_errors = report.fetch_errors,
            flag_errors = report.flag_errors,
            "Log verification pass finished"
        );
        report
    }

    async fn verify(&self, build_id: &str, local: &str, report: &mut VerificationReport) {
        tracing::debug!(build_id = %build_id, "Verifying log");

        let remote = match self.log_store.checksum(build_id).await {
            Ok(remote) => remote,
            Err(e) => {
                report.fetch_errors += 1;
                tracing::error!(build_id = %build_id, error = %e, "Cannot verify checksum");
                return;
            }
        };

        let record = VerificationRecord::new(build_id, local, remote);
        if record.is_match() {
            tracing::info!(build_id = %build_id, checksum = %local, "Build output checksum OK");
            report.matched += 1;
            self.flag(build_id, true, report).await;
            self.ledger.record_match(build_id);
            return;
        }

        tracing::warn!(
            build_id = %build_id,
            local_checksum = %record.local_checksum,
            remote_checksum = ?record.remote_checksum,
            "Build output checksum MISMATCH"
        );
        match self.ledger.record_mismatch(build_id, self.retry_ceiling) {
            RetryDecision::Retry(count) => {
                report.retried += 1;
                tracing::warn!(build_id = %build_id, count, "Increased retry counter");
            }
            RetryDecision::Escalate => {
                report.escalated += 1;
                tracing::warn!(build_id = %build_id, "Marking build as mismatch");
                self.flag(build_id, false, report).await;
            }
        }
    }

    async fn flag(&self, build_id: &str, checksum_match: bool, report: &mut VerificationReport) {
        let value = if checksum_match { "true" } else { "false" };
        if let Err(e) = self
            .orchestrator
            .add_build_attribute(build_id, BUILD_OUTPUT_OK_KEY, value)
            .await
        {
            report.flag_errors += 1;
            tracing::error!(
                build_id = %build_id,
                value,
                error = %e,
                "Cannot set build output attribute"
            );
        }
    }
}

impl std::fmt::Debug for LogVerificationWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogVerificationWorker")
            .field("retry_ceiling", &self.retry_ceiling)
            .field("tracked_mismatches", &self.ledger.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweeper_test_utils::{fixtures, InMemoryLogStore, InMemoryOrchestrator};

    fn worker(
        orchestrator: &Arc<InMemoryOrchestrator>,
        log_store: &Arc<InMemoryLogStore>,
        ceiling: u32,
    ) -> LogVerificationWorker {
        LogVerificationWorker::new(
            orchestrator.clone(),
            log_store.clone(),
            Arc::new(RetryLedger::new()),
            ceiling,
        )
    }

    #[tokio::test]
    async fn test_match_flags_true_and_leaves_no_ledger_entry() {
        let orchestrator = Arc::new(InMemoryOrchestrator::with_builds(vec![
            fixtures::unverified_build("B1", "abc"),
        ]));
        let log_store = Arc::new(InMemoryLogStore::new());
        log_store.set_checksum("B1", "abc");

        let worker = worker(&orchestrator, &log_store, 3);
        let report = worker.run_cycle().await;

        assert_eq!(report.processed, 1);
        assert_eq!(report.matched, 1);
        assert_eq!(
            orchestrator.attribute("B1", BUILD_OUTPUT_OK_KEY).as_deref(),
            Some("true")
        );
        assert!(!worker.ledger().contains("B1"));
    }

    #[tokio::test]
    async fn test_missing_remote_digest_counts_as_mismatch() {
        let orchestrator = Arc::new(InMemoryOrchestrator::with_builds(vec![
            fixtures::unverified_build("B3", "abc"),
        ]));
        let log_store = Arc::new(InMemoryLogStore::new());
        log_store.set_missing("B3");

        let worker = worker(&orchestrator, &log_store, 3);
        let report = worker.run_cycle().await;

        assert_eq!(report.retried, 1);
        assert_eq!(worker.ledger().failures("B3"), Some(1));
        assert!(orchestrator.attribute_updates().is_empty());
    }

    #[tokio::test]
    async fn test_ceiling_one_escalates_on_first_mismatch() {
        let orchestrator = Arc::new(InMemoryOrchestrator::with_builds(vec![
            fixtures::unverified_build("B4", "abc"),
        ]));
        let log_store = Arc::new(InMemoryLogStore::new());
        log_store.set_checksum("B4", "zzz");

        let worker = worker(&orchestrator, &log_store, 1);
        let report = worker.run_cycle().await;

        assert_eq!(report.escalated, 1);
        assert_eq!(
            orchestrator.attribute("B4", BUILD_OUTPUT_OK_KEY).as_deref(),
            Some("false")
        );
        assert!(!worker.ledger().contains("B4"));
    }

    #[tokio::test]
    async fn test_listing_failure_processes_nothing() {
        let orchestrator = Arc::new(InMemoryOrchestrator::with_builds(vec![
            fixtures::unverified_build("B1", "abc"),
        ]));
        orchestrator.fail_queries(true);
        let log_store = Arc::new(InMemoryLogStore::new());

        let worker = worker(&orchestrator, &log_store, 3);
        assert_eq!(worker.run_once().await, 0);
        assert_eq!(log_store.call_count(), 0);
    }
}
