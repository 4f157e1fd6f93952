//! Background Jobs for the sweeper agent
//!
//! - `log_verification`: verifies build output checksums (opt-in)
//! - `temporary_builds`: deletes expired temporary builds and group builds
//!
//! # Usage
//!
//! ```ignore
//! use sweeper_api::jobs::{temporary_builds_cleanup_task, TemporaryBuildsCleanupConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(temporary_builds_cleanup_task(
//!     cleaner,
//!     TemporaryBuildsCleanupConfig::from_env(),
//!     shutdown_rx,
//! ));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

pub mod log_verification;
pub mod temporary_builds;

pub use log_verification::{
    log_verification_task, LogVerificationJobConfig, LogVerificationMetrics,
};
pub use temporary_builds::{
    temporary_builds_cleanup_task, TemporaryBuildsCleanupConfig, TemporaryBuildsCleanupMetrics,
};
