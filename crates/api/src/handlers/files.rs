//! File downloads from run directories.

use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::http::StatusCode;
use axum::response::Response;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAuth;
use crate::state::AppState;

/// GET /api/v1/experiments/download/nwb/{workspace_id}/{uid}
///
/// The run-level NWB export. 404 if the run has none.
pub async fn download_nwb(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path((workspace_id, uid)): Path<(String, String)>,
) -> AppResult<Response> {
    let path = state.store.nwb_file(&workspace_id, &uid, None).await?;
    file_response(&path, true).await
}

/// GET /api/v1/experiments/download/nwb/{workspace_id}/{uid}/{function_id}
pub async fn download_node_nwb(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path((workspace_id, uid, function_id)): Path<(String, String, String)>,
) -> AppResult<Response> {
    let path = state
        .store
        .nwb_file(&workspace_id, &uid, Some(&function_id))
        .await?;
    file_response(&path, true).await
}

/// GET /api/v1/outputs/{workspace_id}/{uid}/{*path}
///
/// An exported output file, `path` being relative to the run directory
/// (for example `mc/mc_images.json`).
pub async fn get_output_file(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path((workspace_id, uid, path)): Path<(String, String, String)>,
) -> AppResult<Response> {
    let file = state.store.output_file(&workspace_id, &uid, &path).await?;
    file_response(&file, false).await
}

/// Stream `path` as the response body.
async fn file_response(path: &FsPath, attachment: bool) -> AppResult<Response> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(path))
        .header(header::CONTENT_LENGTH, size.to_string());
    if attachment {
        if let Some(name) = path.file_name() {
            builder = builder.header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name.to_string_lossy()),
            );
        }
    }
    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

fn content_type_for(path: &FsPath) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("html") => "text/html; charset=utf-8",
        Some("nwb") => "application/x-hdf5",
        Some("yaml") => "application/yaml",
        Some("log") | Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
