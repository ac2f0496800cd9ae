#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use studio_api::auth::jwt::{generate_access_token, JwtConfig};
use studio_api::config::ServerConfig;
use studio_api::router::build_app_router;
use studio_api::state::AppState;
use studio_core::roles::{ROLE_ADMIN, ROLE_USER};
use studio_pipeline::executor::{TaskExecutor, TaskJob};
use studio_pipeline::PipelineError;

pub const TEST_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` rooted at `data_dir`.
pub fn test_config(data_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        data_dir: data_dir.to_path_buf(),
        snakemake_bin: PathBuf::from("snakemake"),
        snakefile: data_dir.join("Snakefile"),
    }
}

/// Executor that records jobs instead of starting the task runner.
#[derive(Default)]
pub struct RecordingExecutor {
    pub jobs: Mutex<Vec<TaskJob>>,
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute(&self, job: TaskJob) -> Result<(), PipelineError> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

/// The full router over a private data directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub executor: Arc<RecordingExecutor>,
    pub data_dir: TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn run_dir(&self, workspace_id: &str, uid: &str) -> PathBuf {
        self.data_dir.path().join("output").join(workspace_id).join(uid)
    }
}

/// Build the application router exactly as `main.rs` does, with a
/// recording executor and a temporary data directory.
pub fn build_test_app() -> TestApp {
    let data_dir = tempfile::tempdir().unwrap();
    let config = test_config(data_dir.path());
    let executor = Arc::new(RecordingExecutor::default());
    let state = AppState::new(config.clone(), executor.clone());
    let router = build_app_router(state.clone(), &config);
    TestApp {
        router,
        state,
        executor,
        data_dir,
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

pub fn token(role: &str) -> String {
    let config = JwtConfig {
        secret: TEST_SECRET.to_string(),
        access_token_expiry_mins: 15,
    };
    generate_access_token("test-user", role, &config).unwrap()
}

pub fn user_token() -> String {
    token(ROLE_USER)
}

pub fn admin_token() -> String {
    token(ROLE_ADMIN)
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn patch_json(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

pub async fn delete(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Run request for `input_0 (movie.tiff) -> mc (caiman_mc)`.
pub fn run_item(name: &str) -> Value {
    json!({
        "name": name,
        "nodeDict": {
            "input_0": {
                "id": "input_0",
                "type": "ImageFileNode",
                "data": {
                    "label": "movie.tiff",
                    "param": {},
                    "path": ["1/movie.tiff"],
                    "type": "image",
                    "fileType": "image"
                },
                "position": {"x": 0.0, "y": 0.0}
            },
            "mc": {
                "id": "mc",
                "type": "AlgorithmNode",
                "data": {
                    "label": "caiman_mc",
                    "param": {"max_shifts": [8, 8]},
                    "type": "algorithm"
                },
                "position": {"x": 250.0, "y": 0.0}
            }
        },
        "edgeDict": {
            "e1": {
                "id": "e1",
                "type": "buttonedge",
                "source": "input_0",
                "sourceHandle": "input_0--image--ImageData",
                "target": "mc",
                "targetHandle": "mc--image--ImageData"
            }
        },
        "snakemakeParam": {},
        "nwbParam": {},
        "forceRunList": []
    })
}

/// Dispatch a run through the API and return its id.
pub async fn start_run(test: &TestApp, workspace_id: &str, name: &str) -> String {
    let response = post_json(
        test.app(),
        &format!("/api/v1/run/{workspace_id}"),
        &user_token(),
        run_item(name),
    )
    .await;
    assert_eq!(response.status(), 200);
    body_json(response).await["data"].as_str().unwrap().to_string()
}

/// Write a node's result artifact as the task runner would.
pub fn write_result(run_dir: &Path, node_id: &str, function: &str, result: Value) {
    let node_dir = run_dir.join(node_id);
    std::fs::create_dir_all(&node_dir).unwrap();
    std::fs::write(
        node_dir.join(format!("{function}.result.json")),
        serde_json::to_vec(&result).unwrap(),
    )
    .unwrap();
}
