//! Route definitions for the `/run` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::run;
use crate::state::AppState;

/// Routes mounted at `/run`.
///
/// ```text
/// POST /{workspace_id}               -> run
/// POST /{workspace_id}/{uid}         -> rerun
/// POST /result/{workspace_id}/{uid}  -> run_result
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{workspace_id}", post(run::run))
        .route("/{workspace_id}/{uid}", post(run::rerun))
        .route("/result/{workspace_id}/{uid}", post(run::run_result))
}
