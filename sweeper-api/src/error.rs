//! Error Types for the sweeper agent
//!
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use sweeper_core::{ConfigError, DeletionError, RemoteError, SweeperError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for agent-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request or configuration contains invalid input
    InvalidInput,

    /// Configuration failed validation
    InvalidConfiguration,

    /// A remote collaborator failed
    RemoteFailure,

    /// Operation timed out
    Timeout,

    /// Internal error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::InvalidConfiguration => StatusCode::BAD_REQUEST,
            ErrorCode::RemoteFailure => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error for agent startup and HTTP responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::invalid_configuration(err.to_string())
    }
}

impl From<RemoteError> for ApiError {
    fn from(err: RemoteError) -> Self {
        ApiError::new(ErrorCode::RemoteFailure, err.to_string())
    }
}

impl From<DeletionError> for ApiError {
    fn from(err: DeletionError) -> Self {
        let code = match err {
            DeletionError::TimedOut { .. } => ErrorCode::Timeout,
            DeletionError::Registry { .. } | DeletionError::Cancelled { .. } => {
                ErrorCode::InternalError
            }
            DeletionError::SendFailed { .. } | DeletionError::RemoteFailure { .. } => {
                ErrorCode::RemoteFailure
            }
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<SweeperError> for ApiError {
    fn from(err: SweeperError) -> Self {
        match err {
            SweeperError::Config(e) => e.into(),
            SweeperError::Remote(e) => e.into(),
            SweeperError::Deletion(e) => e.into(),
            SweeperError::Registry(e) => ApiError::internal_error(e.to_string()),
        }
    }
}

/// Result type alias for agent operations.
pub type ApiResult<T> = Result<T, ApiError>;
