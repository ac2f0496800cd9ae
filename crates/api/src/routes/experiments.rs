//! Route definitions for the `/experiments` resource.

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::handlers::{experiments, files};
use crate::state::AppState;

/// Routes mounted at `/experiments`.
///
/// ```text
/// GET    /{workspace_id}                 -> list_experiments
/// GET    /fetch/{workspace_id}           -> fetch_last_experiment
/// GET    /import/{workspace_id}/{uid}    -> import_experiment
/// PATCH  /{workspace_id}/{uid}/rename    -> rename_experiment
/// DELETE /{workspace_id}/{uid}           -> delete_experiment
/// POST   /delete/{workspace_id}          -> delete_experiments (admin)
/// GET    /download/nwb/{workspace_id}/{uid}                -> download_nwb
/// GET    /download/nwb/{workspace_id}/{uid}/{function_id}  -> download_node_nwb
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{workspace_id}", get(experiments::list_experiments))
        .route("/fetch/{workspace_id}", get(experiments::fetch_last_experiment))
        .route("/import/{workspace_id}/{uid}", get(experiments::import_experiment))
        .route("/{workspace_id}/{uid}/rename", patch(experiments::rename_experiment))
        .route("/{workspace_id}/{uid}", delete(experiments::delete_experiment))
        .route("/delete/{workspace_id}", post(experiments::delete_experiments))
        .route("/download/nwb/{workspace_id}/{uid}", get(files::download_nwb))
        .route(
            "/download/nwb/{workspace_id}/{uid}/{function_id}",
            get(files::download_node_nwb),
        )
}
