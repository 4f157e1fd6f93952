//! HTTP Routes Module
//!
//! - Delete callbacks from the orchestrator
//! - Health check

pub mod callbacks;
pub mod health;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the agent's router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/callbacks/delete", callbacks::create_router())
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
