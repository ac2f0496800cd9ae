//! Route definitions for parameter defaults and the algorithm catalogue.

use axum::routing::get;
use axum::Router;

use crate::handlers::params;
use crate::state::AppState;

/// ```text
/// GET /params/{name}   -> get_params
/// GET /snakemake       -> get_snakemake_params
/// GET /nwb             -> get_nwb_params
/// GET /algolist        -> get_algolist
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/params/{name}", get(params::get_params))
        .route("/snakemake", get(params::get_snakemake_params))
        .route("/nwb", get(params::get_nwb_params))
        .route("/algolist", get(params::get_algolist))
}
