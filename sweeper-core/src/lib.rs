//! Sweeper Core - Coordination Primitives
//!
//! The pieces shared by the build maintenance workflows:
//! - `checksum`: comparison of local and remote build output checksums
//! - `retry`: bounded-retry ledger turning persistent mismatches into a decision
//! - `registry`: callback registry for remote operations that complete out of band
//! - `entities`: read-only references to orchestrator-owned builds
//! - `collaborators`: async traits for the orchestrator and the log store
//!
//! No HTTP and no process wiring lives here.

pub mod checksum;
pub mod collaborators;
pub mod config;
pub mod entities;
pub mod error;
pub mod registry;
pub mod retry;

pub use checksum::{compare_checksums, ChecksumOutcome, VerificationRecord};
pub use collaborators::{LogStoreClient, OrchestratorClient};
pub use config::CoordinationConfig;
pub use entities::{
    format_timestamp_for_rsql, Build, DeleteOperationResult, EntityKind, GroupBuild, GroupBuildRef,
    ResultStatus, BUILD_ARCHIVED_KEY, BUILD_OUTPUT_OK_KEY,
};
pub use error::{
    ConfigError, DeletionError, RegistryError, RemoteError, SweeperError, SweeperResult,
};
pub use registry::{CallbackOutcome, CallbackRegistry};
pub use retry::{RetryDecision, RetryLedger};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
