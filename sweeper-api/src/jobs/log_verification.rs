//! Log Verification Background Task
//!
//! Periodically runs a [`LogVerificationWorker`] pass. A pass is awaited
//! inline, so a tick that fires while a pass is still running is skipped
//! rather than queued.
//!
//! The job is opt-in: it only runs when `SWEEPER_LOG_VERIFIER_ENABLED=true`.

use crate::constants::DEFAULT_LOG_VERIFICATION_INTERVAL_SECS;
use crate::workers::{LogVerificationWorker, VerificationReport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the log verification task.
#[derive(Debug, Clone)]
pub struct LogVerificationJobConfig {
    /// Whether the task runs at all (default: false)
    pub enabled: bool,

    /// Time between passes (default: 1 hour)
    pub interval: Duration,
}

impl Default for LogVerificationJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(DEFAULT_LOG_VERIFICATION_INTERVAL_SECS),
        }
    }
}

impl LogVerificationJobConfig {
    /// Create LogVerificationJobConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `SWEEPER_LOG_VERIFIER_ENABLED`: Run the verifier (default: false)
    /// - `SWEEPER_LOG_VERIFIER_INTERVAL_SECS`: Time between passes (default: 3600)
    pub fn from_env() -> Self {
        let enabled = std::env::var("SWEEPER_LOG_VERIFIER_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(false);

        let interval = Duration::from_secs(
            std::env::var("SWEEPER_LOG_VERIFIER_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_LOG_VERIFICATION_INTERVAL_SECS),
        );

        Self { enabled, interval }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters accumulated over the task's lifetime.
#[derive(Debug, Default)]
pub struct LogVerificationMetrics {
    pub cycles: AtomicU64,
    pub builds_processed: AtomicU64,
    pub builds_matched: AtomicU64,
    pub mismatches_retried: AtomicU64,
    pub mismatches_escalated: AtomicU64,
    /// Fetch and flag failures
    pub errors: AtomicU64,
}

impl LogVerificationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one pass into the counters.
    pub fn record(&self, report: &VerificationReport) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.builds_processed
            .fetch_add(report.processed as u64, Ordering::Relaxed);
        self.builds_matched
            .fetch_add(report.matched as u64, Ordering::Relaxed);
        self.mismatches_retried
            .fetch_add(report.retried as u64, Ordering::Relaxed);
        self.mismatches_escalated
            .fetch_add(report.escalated as u64, Ordering::Relaxed);
        self.errors.fetch_add(
            (report.fetch_errors + report.flag_errors) as u64,
            Ordering::Relaxed,
        );
    }

    pub fn snapshot(&self) -> LogVerificationSnapshot {
        LogVerificationSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            builds_processed: self.builds_processed.load(Ordering::Relaxed),
            builds_matched: self.builds_matched.load(Ordering::Relaxed),
            mismatches_retried: self.mismatches_retried.load(Ordering::Relaxed),
            mismatches_escalated: self.mismatches_escalated.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogVerificationSnapshot {
    pub cycles: u64,
    pub builds_processed: u64,
    pub builds_matched: u64,
    pub mismatches_retried: u64,
    pub mismatches_escalated: u64,
    pub errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Run verification passes until the shutdown signal is received.
///
/// Returns immediately when the job is disabled.
pub async fn log_verification_task(
    worker: Arc<LogVerificationWorker>,
    config: LogVerificationJobConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<LogVerificationMetrics> {
    let metrics = Arc::new(LogVerificationMetrics::new());

    if !config.enabled {
        tracing::info!("Log verification task disabled");
        return metrics;
    }

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        "Log verification task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Log verification task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                let report = worker.run_cycle().await;
                metrics.record(&report);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        builds_processed = snapshot.builds_processed,
        mismatches_escalated = snapshot.mismatches_escalated,
        errors = snapshot.errors,
        "Log verification task completed"
    );

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweeper_core::RetryLedger;
    use sweeper_test_utils::{fixtures, InMemoryLogStore, InMemoryOrchestrator};

    fn worker() -> Arc<LogVerificationWorker> {
        let orchestrator = Arc::new(InMemoryOrchestrator::with_builds(vec![
            fixtures::unverified_build("B1", "abc"),
            fixtures::unverified_build("B2", "def"),
        ]));
        let log_store = Arc::new(InMemoryLogStore::new());
        log_store.set_checksum("B1", "abc");
        log_store.set_checksum("B2", "xyz");
        Arc::new(LogVerificationWorker::new(
            orchestrator,
            log_store,
            Arc::new(RetryLedger::new()),
            3,
        ))
    }

    #[test]
    fn test_config_default_is_disabled() {
        let config = LogVerificationJobConfig::default();
        assert!(!config.enabled);
        assert_eq!(
            config.interval,
            Duration::from_secs(DEFAULT_LOG_VERIFICATION_INTERVAL_SECS)
        );
    }

    #[test]
    fn test_metrics_record_report() {
        let metrics = LogVerificationMetrics::new();
        metrics.record(&VerificationReport {
            processed: 4,
            matched: 1,
            retried: 1,
            escalated: 1,
            skipped: 0,
            fetch_errors: 1,
            flag_errors: 1,
        });
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.builds_processed, 4);
        assert_eq!(snapshot.errors, 2);
    }

    #[tokio::test]
    async fn test_disabled_task_returns_immediately() {
        let (_tx, rx) = watch::channel(false);
        let metrics =
            log_verification_task(worker(), LogVerificationJobConfig::default(), rx).await;
        assert_eq!(metrics.snapshot().cycles, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_runs_first_pass_and_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let config = LogVerificationJobConfig {
            enabled: true,
            interval: Duration::from_secs(3600),
        };
        let handle = tokio::spawn(log_verification_task(worker(), config, rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(true).unwrap();

        let snapshot = handle.await.unwrap().snapshot();
        assert_eq!(snapshot.cycles, 1);
        assert_eq!(snapshot.builds_processed, 2);
        assert_eq!(snapshot.builds_matched, 1);
        assert_eq!(snapshot.mismatches_retried, 1);
    }
}
