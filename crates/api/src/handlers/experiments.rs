//! Handlers for persisted runs.

use axum::extract::{Path, State};
use axum::Json;
use indexmap::IndexMap;
use serde::Deserialize;
use studio_core::experiment::ExptConfig;
use studio_core::types::RunId;
use studio_core::workflow::WorkflowGraph;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireAdmin, RequireAuth};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RenameExperiment {
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteExperiments {
    #[serde(rename = "uidList")]
    pub uid_list: Vec<RunId>,
}

/// GET /api/v1/experiments/{workspace_id}
///
/// Every run of the workspace keyed by run id, oldest first, without the
/// embedded graph.
pub async fn list_experiments(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> AppResult<Json<DataResponse<IndexMap<RunId, ExptConfig>>>> {
    let data = state
        .store
        .list_experiments(&workspace_id)
        .await?
        .into_iter()
        .map(|config| (config.unique_id.clone(), config.without_graph()))
        .collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/experiments/fetch/{workspace_id}
///
/// The most recently started run, or `null` for an empty workspace.
pub async fn fetch_last_experiment(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> AppResult<Json<DataResponse<Option<ExptConfig>>>> {
    let data = state.store.last_experiment(&workspace_id).await?;
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/experiments/import/{workspace_id}/{uid}
///
/// The graph a run executed, for loading back onto the canvas.
pub async fn import_experiment(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path((workspace_id, uid)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<WorkflowGraph>>> {
    let config = state.store.read(&workspace_id, &uid).await?;
    Ok(Json(DataResponse {
        data: config.graph(),
    }))
}

/// PATCH /api/v1/experiments/{workspace_id}/{uid}/rename
pub async fn rename_experiment(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path((workspace_id, uid)): Path<(String, String)>,
    Json(body): Json<RenameExperiment>,
) -> AppResult<Json<DataResponse<ExptConfig>>> {
    let _guard = state.run_locks.lock(&workspace_id, &uid).await;
    let config = state.store.rename(&workspace_id, &uid, &body.new_name).await?;
    Ok(Json(DataResponse {
        data: config.without_graph(),
    }))
}

/// DELETE /api/v1/experiments/{workspace_id}/{uid}
///
/// Remove the run's output directory. A still-executing task runner is not
/// stopped.
pub async fn delete_experiment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((workspace_id, uid)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<bool>>> {
    let _guard = state.run_locks.lock(&workspace_id, &uid).await;
    state.store.delete_run(&workspace_id, &uid).await?;
    tracing::info!(user_id = %user.user_id, %workspace_id, unique_id = %uid, "Experiment deleted");
    Ok(Json(DataResponse { data: true }))
}

/// POST /api/v1/experiments/delete/{workspace_id}
///
/// Admin only. Deletes every listed run that exists and returns their ids.
pub async fn delete_experiments(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(body): Json<DeleteExperiments>,
) -> AppResult<Json<DataResponse<Vec<RunId>>>> {
    let deleted = state.store.delete_runs(&workspace_id, &body.uid_list).await?;
    tracing::info!(
        user_id = %admin.user_id,
        %workspace_id,
        count = deleted.len(),
        "Experiments deleted"
    );
    Ok(Json(DataResponse { data: deleted }))
}
