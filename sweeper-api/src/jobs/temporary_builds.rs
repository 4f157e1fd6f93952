//! Temporary Builds Cleanup Background Task
//!
//! Periodically deletes temporary builds and group builds that outlived their
//! lifespan. Each pass is awaited inline, so overlapping passes never happen.

use crate::constants::{DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_TEMPORARY_BUILD_LIFESPAN_DAYS};
use crate::workers::{CleanupReport, TemporaryBuildsCleaner};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the temporary builds cleanup task.
#[derive(Debug, Clone)]
pub struct TemporaryBuildsCleanupConfig {
    /// Whether the task runs at all (default: true)
    pub enabled: bool,

    /// Time between passes (default: 24 hours)
    pub interval: Duration,

    /// Age in days after which a temporary build is deleted (default: 14)
    pub lifespan_days: i64,
}

impl Default for TemporaryBuildsCleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            lifespan_days: DEFAULT_TEMPORARY_BUILD_LIFESPAN_DAYS,
        }
    }
}

impl TemporaryBuildsCleanupConfig {
    /// Create TemporaryBuildsCleanupConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `SWEEPER_CLEANUP_ENABLED`: Run the cleaner (default: true)
    /// - `SWEEPER_CLEANUP_INTERVAL_SECS`: Time between passes (default: 86400)
    /// - `SWEEPER_TEMPORARY_BUILD_LIFESPAN_DAYS`: Expiry age (default: 14)
    pub fn from_env() -> Self {
        let enabled = std::env::var("SWEEPER_CLEANUP_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let interval = Duration::from_secs(
            std::env::var("SWEEPER_CLEANUP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
        );

        let lifespan_days = std::env::var("SWEEPER_TEMPORARY_BUILD_LIFESPAN_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|days: &i64| *days >= 0)
            .unwrap_or(DEFAULT_TEMPORARY_BUILD_LIFESPAN_DAYS);

        Self {
            enabled,
            interval,
            lifespan_days,
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters accumulated over the task's lifetime.
#[derive(Debug, Default)]
pub struct TemporaryBuildsCleanupMetrics {
    pub cycles: AtomicU64,
    pub builds_deleted: AtomicU64,
    pub group_builds_deleted: AtomicU64,
    pub builds_skipped: AtomicU64,
    pub deletion_failures: AtomicU64,
}

impl TemporaryBuildsCleanupMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one pass into the counters.
    pub fn record(&self, report: &CleanupReport) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.builds_deleted
            .fetch_add(report.deleted_builds as u64, Ordering::Relaxed);
        self.group_builds_deleted
            .fetch_add(report.deleted_group_builds as u64, Ordering::Relaxed);
        self.builds_skipped
            .fetch_add(report.skipped_builds as u64, Ordering::Relaxed);
        self.deletion_failures
            .fetch_add(report.failures() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TemporaryBuildsCleanupSnapshot {
        TemporaryBuildsCleanupSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            builds_deleted: self.builds_deleted.load(Ordering::Relaxed),
            group_builds_deleted: self.group_builds_deleted.load(Ordering::Relaxed),
            builds_skipped: self.builds_skipped.load(Ordering::Relaxed),
            deletion_failures: self.deletion_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryBuildsCleanupSnapshot {
    pub cycles: u64,
    pub builds_deleted: u64,
    pub group_builds_deleted: u64,
    pub builds_skipped: u64,
    pub deletion_failures: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Run cleanup passes until the shutdown signal is received.
pub async fn temporary_builds_cleanup_task(
    cleaner: Arc<TemporaryBuildsCleaner>,
    config: TemporaryBuildsCleanupConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<TemporaryBuildsCleanupMetrics> {
    let metrics = Arc::new(TemporaryBuildsCleanupMetrics::new());

    if !config.enabled {
        tracing::info!("Temporary builds cleanup task disabled");
        return metrics;
    }

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        lifespan_days = config.lifespan_days,
        "Temporary builds cleanup task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Temporary builds cleanup task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                tracing::info!("Regular deletion of temporary builds triggered by clock");
                let report = cleaner.cleanup_expired(chrono::Utc::now()).await;
                metrics.record(&report);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        cycles = snapshot.cycles,
        builds_deleted = snapshot.builds_deleted,
        group_builds_deleted = snapshot.group_builds_deleted,
        deletion_failures = snapshot.deletion_failures,
        "Temporary builds cleanup task completed"
    );

    metrics
}
