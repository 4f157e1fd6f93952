//! Callback and health route tests

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use std::time::Duration;
use sweeper_api::routes::health::HealthResponse;
use sweeper_api::{create_router, AppState};
use sweeper_core::CallbackOutcome;
use sweeper_test_utils::*;
use tower::ServiceExt; // for `oneshot`

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

async fn send(app: Router, request: Request<Body>) -> StatusCode {
    app.oneshot(request)
        .await
        .expect("router responds")
        .status()
}

#[tokio::test]
async fn build_callback_resolves_pending_operation() {
    let state = AppState::new();
    state.build_callbacks.register("100").expect("fresh id");

    let status = send(
        create_router(state.clone()),
        post_json(
            "/callbacks/delete/builds/100",
            r#"{"id":"100","status":"SUCCESS"}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let outcome = state
        .build_callbacks
        .await_completion("100", Duration::from_millis(10))
        .await
        .expect("registered");
    assert_eq!(
        outcome,
        CallbackOutcome::Completed(DeleteOperationResult::success("100"))
    );
}

#[tokio::test]
async fn unknown_id_is_acknowledged() {
    let state = AppState::new();
    let status = send(
        create_router(state.clone()),
        post_json(
            "/callbacks/delete/group-builds/nope",
            r#"{"id":"nope","status":"SUCCESS"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(state.group_build_callbacks.is_empty());
}

#[tokio::test]
async fn duplicate_callback_is_acknowledged() {
    let state = AppState::new();
    state.build_callbacks.register("7").expect("fresh id");
    let app = create_router(state.clone());
    let body = r#"{"id":"7","status":"SUCCESS"}"#;

    assert_eq!(
        send(app.clone(), post_json("/callbacks/delete/builds/7", body)).await,
        StatusCode::OK
    );
    assert_eq!(
        send(app, post_json("/callbacks/delete/builds/7", body)).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn callback_only_reaches_registry_of_its_kind() {
    let state = AppState::new();
    state.build_callbacks.register("55").expect("fresh id");

    send(
        create_router(state.clone()),
        post_json(
            "/callbacks/delete/group-builds/55",
            r#"{"id":"55","status":"SUCCESS"}"#,
        ),
    )
    .await;

    let outcome = state
        .build_callbacks
        .await_completion("55", Duration::from_millis(10))
        .await
        .expect("registered");
    assert_eq!(outcome, CallbackOutcome::TimedOut);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let state = AppState::new();
    state.build_callbacks.register("9").expect("fresh id");

    let status = send(
        create_router(state.clone()),
        post_json("/callbacks/delete/builds/9", "{not json"),
    )
    .await;

    assert!(status.is_client_error());
    assert!(state.build_callbacks.is_pending("9"));
}

#[tokio::test]
async fn health_reports_pending_counts() {
    let state = AppState::new();
    state.build_callbacks.register("1").expect("fresh id");
    state.build_callbacks.register("2").expect("fresh id");
    state.group_build_callbacks.register("1").expect("fresh id");

    let response = create_router(state)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("valid request"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let health: HealthResponse = serde_json::from_slice(&bytes).expect("health json");
    assert_eq!(health.status, "healthy");
    assert_eq!(health.pending_build_deletions, 2);
    assert_eq!(health.pending_group_build_deletions, 1);
    assert_eq!(health.tracked_mismatches, 0);
}
