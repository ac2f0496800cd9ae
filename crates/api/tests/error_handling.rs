//! Tests for `AppError` to HTTP response mapping.
//!
//! They call `IntoResponse` directly; no router is involved.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use studio_api::error::AppError;
use studio_core::error::CoreError;
use studio_pipeline::PipelineError;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ---------------------------------------------------------------------------
// Core errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let (status, json) = error_to_response(CoreError::not_found("Algorithm", "foo").into()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Algorithm with id foo not found");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("cycle through node n1".into()));
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "cycle through node n1");
}

#[tokio::test]
async fn forbidden_error_returns_403() {
    let (status, json) = error_to_response(CoreError::Forbidden("Admin role required".into()).into()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn internal_core_error_is_sanitized() {
    let (status, json) = error_to_response(CoreError::Internal("secret detail".into()).into()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_run_returns_404() {
    let err = AppError::Pipeline(PipelineError::RunNotFound {
        workspace_id: "1".into(),
        unique_id: "abcd1234".into(),
    });
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Run abcd1234 not found in workspace 1");
}

#[tokio::test]
async fn wrapped_core_error_keeps_its_status() {
    let err = AppError::Pipeline(PipelineError::Core(CoreError::Validation("bad id".into())));
    let (status, _) = error_to_response(err).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn io_error_is_sanitized_500() {
    let err = AppError::Pipeline(PipelineError::Io {
        path: PathBuf::from("/data/output/1/r1/experiment.yaml"),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    });
    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// HTTP errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_error_is_sanitized() {
    let (status, json) = error_to_response(AppError::InternalError("open failed: EACCES".into())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}
