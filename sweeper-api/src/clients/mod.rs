//! HTTP clients for the orchestrator and the log store.
//!
//! Both implement the collaborator traits from `sweeper-core`, so workers
//! never see reqwest types.

pub mod log_store;
pub mod orchestrator;

pub use log_store::HttpLogStoreClient;
pub use orchestrator::HttpOrchestratorClient;

use reqwest::Response;
use serde::de::DeserializeOwned;
use std::time::Duration;
use sweeper_core::RemoteError;

pub(crate) fn request_failed(service: &str, status: u16, message: impl Into<String>) -> RemoteError {
    RemoteError::RequestFailed {
        service: service.to_string(),
        status,
        message: message.into(),
    }
}

pub(crate) fn invalid_response(service: &str, reason: impl Into<String>) -> RemoteError {
    RemoteError::InvalidResponse {
        service: service.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn transport(service: &str, err: reqwest::Error) -> RemoteError {
    RemoteError::Transport {
        service: service.to_string(),
        reason: err.to_string(),
    }
}

/// Build a reqwest client with the agent-wide request timeout.
pub(crate) fn build_http_client(service: &str, timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| transport(service, e))
}

/// Fail on non-2xx, carrying the response body as the message.
pub(crate) async fn ensure_success(service: &str, response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(request_failed(service, status.as_u16(), body))
}

/// Check the status and decode a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &str,
    response: Response,
) -> Result<T, RemoteError> {
    ensure_success(service, response)
        .await?
        .json()
        .await
        .map_err(|e| invalid_response(service, format!("Failed to parse response: {}", e)))
}

/// Join a base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
