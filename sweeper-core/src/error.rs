//! Error types for sweeper operations

use crate::entities::{EntityKind, ResultStatus};
use std::time::Duration;
use thiserror::Error;

/// Callback registry errors.
///
/// These are local coordination errors: they indicate a caller bug or a
/// late/duplicate callback, never a remote failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Operation already registered: {op_id}")]
    AlreadyRegistered { op_id: String },

    #[error("Operation not registered: {op_id}")]
    NotRegistered { op_id: String },

    #[error("Operation {op_id} is already being awaited")]
    AlreadyAwaited { op_id: String },
}

/// Errors returned by remote collaborators (orchestrator, log store).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Request to {service} failed with status {status}: {message}")]
    RequestFailed {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("Transport error talking to {service}: {reason}")]
    Transport { service: String, reason: String },
}

impl RemoteError {
    /// HTTP-like status code of the failure, when the remote side produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::RequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Typed failure of a single asynchronous deletion.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeletionError {
    #[error("Deletion of {kind} {id} failed! The request failed: {source}")]
    SendFailed {
        kind: EntityKind,
        id: String,
        #[source]
        source: RemoteError,
    },

    #[error("Deletion of {kind} {id} failed! Orchestrator reported a failure: [status={status:?}, message={message:?}]")]
    RemoteFailure {
        kind: EntityKind,
        id: String,
        status: Option<ResultStatus>,
        message: Option<String>,
    },

    #[error("Deletion of {kind} {id} timed out after {timeout:?} without a callback")]
    TimedOut {
        kind: EntityKind,
        id: String,
        timeout: Duration,
    },

    #[error("Deletion of {kind} {id} was cancelled while waiting for the callback")]
    Cancelled { kind: EntityKind, id: String },

    #[error("Deletion of {kind} {id} could not be coordinated: {source}")]
    Registry {
        kind: EntityKind,
        id: String,
        #[source]
        source: RegistryError,
    },
}

impl DeletionError {
    /// Identifier of the entity whose deletion failed.
    pub fn id(&self) -> &str {
        match self {
            DeletionError::SendFailed { id, .. }
            | DeletionError::RemoteFailure { id, .. }
            | DeletionError::TimedOut { id, .. }
            | DeletionError::Cancelled { id, .. }
            | DeletionError::Registry { id, .. } => id,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all sweeper errors.
#[derive(Debug, Clone, Error)]
pub enum SweeperError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Deletion error: {0}")]
    Deletion(#[from] DeletionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for sweeper operations.
pub type SweeperResult<T> = Result<T, SweeperError>;

// =============================================================================
// TESTS
// =============================================================================
