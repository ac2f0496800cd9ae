//! Handlers for parameter defaults and the algorithm catalogue.

use axum::extract::Path;
use axum::Json;
use indexmap::IndexMap;
use studio_core::nwb::NWB_PARAMS_NAME;
use studio_core::params::ParamTree;
use studio_core::registry::{get_default_params, AlgoTreeNode, AlgorithmRegistry};
use studio_core::snakemake::SNAKEMAKE_PARAMS_NAME;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;

/// GET /api/v1/params/{name}
///
/// Default parameter tree of an algorithm. 404 for unknown names.
pub async fn get_params(
    RequireAuth(_user): RequireAuth,
    Path(name): Path<String>,
) -> AppResult<Json<DataResponse<ParamTree>>> {
    let data = get_default_params(&name)?;
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/snakemake
pub async fn get_snakemake_params(
    RequireAuth(_user): RequireAuth,
) -> AppResult<Json<DataResponse<ParamTree>>> {
    let data = get_default_params(SNAKEMAKE_PARAMS_NAME)?;
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/nwb
pub async fn get_nwb_params(
    RequireAuth(_user): RequireAuth,
) -> AppResult<Json<DataResponse<ParamTree>>> {
    let data = get_default_params(NWB_PARAMS_NAME)?;
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/algolist
///
/// Every registered algorithm, nested by category.
pub async fn get_algolist(
    RequireAuth(_user): RequireAuth,
) -> Json<DataResponse<IndexMap<String, AlgoTreeNode>>> {
    Json(DataResponse {
        data: AlgorithmRegistry::global().algo_tree(),
    })
}
