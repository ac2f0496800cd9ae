pub mod experiments;
pub mod health;
pub mod outputs;
pub mod params;
pub mod run;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree. Every route requires a Bearer token.
///
/// ```text
/// /params/{name}                         default parameters of an algorithm
/// /snakemake                             task runner settings defaults
/// /nwb                                   NWB export settings defaults
/// /algolist                              algorithm catalogue
///
/// /run/{workspace_id}                    dispatch a new run (POST)
/// /run/{workspace_id}/{uid}              re-run in place (POST)
/// /run/result/{workspace_id}/{uid}       collect node results (POST)
///
/// /experiments/{workspace_id}            list runs
/// /experiments/fetch/{workspace_id}      latest run
/// /experiments/import/{workspace_id}/{uid}  graph of a run
/// /experiments/{workspace_id}/{uid}/rename  rename (PATCH)
/// /experiments/{workspace_id}/{uid}      delete (DELETE)
/// /experiments/delete/{workspace_id}     bulk delete (POST, admin only)
/// /experiments/download/nwb/{workspace_id}/{uid}[/{function_id}]
///                                        NWB export of a run or node
///
/// /outputs/{workspace_id}/{uid}/{*path}  exported output file
/// ```
///
/// The fixed segments `fetch`, `import`, `delete`, `download` and `result`
/// cannot be used as workspace ids.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(params::router())
        .nest("/run", run::router())
        .nest("/experiments", experiments::router())
        .nest("/outputs", outputs::router())
}
