//! Sweeper API - Build Maintenance Agent
//!
//! Hosts the two maintenance workflows and the HTTP surface they need:
//!
//! - log verification: compares build output checksums against digests
//!   recomputed by the log store, escalating persistent mismatches
//! - temporary build cleanup: deletes expired builds and group builds through
//!   the orchestrator, whose deletions complete via an HTTP callback
//!
//! The callback routes resolve the pending operations the deletion workers
//! wait on, so the router and the workers share one [`AppState`].

pub mod agent;
pub mod clients;
pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod workers;

pub use agent::{build_workers, Workers};
pub use clients::{HttpLogStoreClient, HttpOrchestratorClient};
pub use config::{AgentConfig, OrchestratorToken};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_router;
pub use state::{AppState, DeleteRegistry};
pub use workers::{
    callback_url, AsyncDeletionWorker, CleanupReport, DeletionState, LogVerificationWorker,
    TemporaryBuildsCleaner, VerificationReport,
};
