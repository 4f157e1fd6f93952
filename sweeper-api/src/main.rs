//! Sweeper Agent Entry Point
//!
//! Loads configuration, starts the callback server and spawns the
//! maintenance jobs. Ctrl-C stops the server and signals the jobs, which
//! cancel any deletion still waiting for its callback.

use std::sync::Arc;

use sweeper_api::jobs::{
    log_verification_task, temporary_builds_cleanup_task, LogVerificationJobConfig,
    TemporaryBuildsCleanupConfig,
};
use sweeper_api::telemetry::{init_tracing, TelemetryConfig};
use sweeper_api::{
    build_workers, create_router, AgentConfig, ApiError, ApiResult, AppState,
    HttpLogStoreClient, HttpOrchestratorClient,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let config = AgentConfig::from_env()?;

    let telemetry_config = TelemetryConfig {
        json: config.json_logs,
        ..TelemetryConfig::default()
    };
    init_tracing(&telemetry_config)?;

    config.validate()?;
    let verifier_config = LogVerificationJobConfig::from_env();
    let cleanup_config = TemporaryBuildsCleanupConfig::from_env();

    let orchestrator = Arc::new(HttpOrchestratorClient::new(
        config.orchestrator_url.clone(),
        config.orchestrator_token.clone(),
        config.http_timeout,
    )?);
    let log_store = Arc::new(HttpLogStoreClient::new(
        config.log_store_url.clone(),
        config.coordination.checksum_batch_size,
        config.http_timeout,
    )?);
    if config.orchestrator_token.is_none() {
        tracing::warn!("No orchestrator token configured; attribute and delete requests are unauthenticated");
    }

    let state = AppState::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = build_workers(
        &config,
        cleanup_config.lifespan_days,
        &state,
        orchestrator,
        log_store,
        shutdown_rx.clone(),
    );

    let verifier_handle = tokio::spawn(log_verification_task(
        workers.verifier.clone(),
        verifier_config,
        shutdown_rx.clone(),
    ));
    let cleanup_handle = tokio::spawn(temporary_builds_cleanup_task(
        workers.cleaner.clone(),
        cleanup_config,
        shutdown_rx,
    ));

    let addr = config.bind_addr()?;
    tracing::info!(%addr, application_url = %config.application_url, "Starting sweeper agent");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let app = create_router(state);
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = verifier_handle.await {
        tracing::error!(job = "log_verification", error = %e, "Job panicked");
    }
    if let Err(e) = cleanup_handle.await {
        tracing::error!(job = "temporary_builds_cleanup", error = %e, "Job panicked");
    }

    tracing::info!("Sweeper agent stopped");
    Ok(())
}
