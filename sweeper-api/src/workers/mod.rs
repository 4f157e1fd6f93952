//! Workflows driven by the periodic jobs.
//!
//! - `log_verification`: checksum verification with bounded retries
//! - `deletion`: callback-coordinated deletion of one entity
//! - `temporary_builds`: expiry sweep over temporary builds and group builds

pub mod deletion;
pub mod log_verification;
pub mod temporary_builds;

pub use deletion::{callback_url, AsyncDeletionWorker, DeletionState};
pub use log_verification::{LogVerificationWorker, VerificationReport};
pub use temporary_builds::{CleanupReport, TemporaryBuildsCleaner};
