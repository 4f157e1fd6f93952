//! Health Check Endpoint
//!
//! Reports liveness plus the number of deletions still waiting for a callback.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub pending_build_deletions: usize,
    pub pending_group_build_deletions: usize,
    pub tracked_mismatches: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        pending_build_deletions: state.build_callbacks.len(),
        pending_group_build_deletions: state.group_build_callbacks.len(),
        tracked_mismatches: state.ledger.len(),
    };
    (StatusCode::OK, Json(response))
}
