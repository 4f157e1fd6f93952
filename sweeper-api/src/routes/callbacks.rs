//! Delete callback endpoints
//!
//! The orchestrator POSTs a `DeleteOperationResult` here once an asynchronous
//! deletion finished. The answer is always `200 OK`: a late or unknown id is
//! our problem, not the orchestrator's.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use sweeper_core::{DeleteOperationResult, EntityKind};

use crate::state::AppState;

/// POST /callbacks/delete/builds/:id
pub async fn build_deleted(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(result): Json<DeleteOperationResult>,
) -> StatusCode {
    deliver(&state, EntityKind::Build, &id, result)
}

/// POST /callbacks/delete/group-builds/:id
pub async fn group_build_deleted(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(result): Json<DeleteOperationResult>,
) -> StatusCode {
    deliver(&state, EntityKind::GroupBuild, &id, result)
}

fn deliver(state: &AppState, kind: EntityKind, id: &str, result: DeleteOperationResult) -> StatusCode {
    tracing::info!(kind = %kind, id = %id, status = ?result.status, "Delete callback received");
    if !state.registry_for(kind).resolve(id, result) {
        tracing::debug!(kind = %kind, id = %id, "No pending deletion for callback, ignoring");
    }
    StatusCode::OK
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/builds/:id", post(build_deleted))
        .route("/group-builds/:id", post(group_build_deleted))
}
