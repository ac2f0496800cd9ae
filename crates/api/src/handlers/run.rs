//! Handlers for dispatching runs and polling their results.

use axum::extract::{Path, State};
use axum::Json;
use indexmap::IndexMap;
use serde::Deserialize;
use studio_core::experiment::Message;
use studio_core::types::{NodeId, RunId};
use studio_pipeline::collator::WorkflowResult;
use studio_pipeline::layout::new_run_id;
use studio_pipeline::runner::RunItem;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NodeItemList {
    #[serde(rename = "pendingNodeIdList")]
    pub pending_node_id_list: Vec<NodeId>,
}

/// POST /api/v1/run/{workspace_id}
///
/// Dispatch a new run and return its id without waiting for it.
pub async fn run(
    user: AuthUser,
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
    Json(item): Json<RunItem>,
) -> AppResult<Json<DataResponse<RunId>>> {
    let unique_id = new_run_id();
    let data = state.runner.run(&workspace_id, &unique_id, item).await?;
    tracing::info!(user_id = %user.user_id, %workspace_id, unique_id = %data, "Run started");
    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/run/{workspace_id}/{uid}
///
/// Re-run an existing run in place, keeping its id. 404 if the run does
/// not exist.
pub async fn rerun(
    user: AuthUser,
    State(state): State<AppState>,
    Path((workspace_id, uid)): Path<(String, String)>,
    Json(item): Json<RunItem>,
) -> AppResult<Json<DataResponse<RunId>>> {
    let _guard = state.run_locks.lock(&workspace_id, &uid).await;
    state.store.existing_run(&workspace_id, &uid).await?;
    let data = state.runner.run(&workspace_id, &uid, item).await?;
    tracing::info!(user_id = %user.user_id, %workspace_id, unique_id = %data, "Run restarted");
    Ok(Json(DataResponse { data }))
}

/// POST /api/v1/run/result/{workspace_id}/{uid}
///
/// Collect outcomes for the pending nodes. Nodes that have not produced a
/// result yet are absent from the returned map.
pub async fn run_result(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path((workspace_id, uid)): Path<(String, String)>,
    Json(body): Json<NodeItemList>,
) -> AppResult<Json<DataResponse<IndexMap<NodeId, Message>>>> {
    let _guard = state.run_locks.lock(&workspace_id, &uid).await;
    let run = state.store.existing_run(&workspace_id, &uid).await?;
    let data = WorkflowResult::new(run)
        .get(&body.pending_node_id_list)
        .await?;
    Ok(Json(DataResponse { data }))
}
