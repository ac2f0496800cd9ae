//! Route definitions for the `/outputs` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::files;
use crate::state::AppState;

/// Routes mounted at `/outputs`.
///
/// ```text
/// GET /{workspace_id}/{uid}/{*path}  -> get_output_file
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{workspace_id}/{uid}/{*path}", get(files::get_output_file))
}
