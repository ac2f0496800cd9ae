//! Algorithm registry.
//!
//! Built once from a static table and queried by name. Each entry declares
//! its input/output ports (used to validate and wire the task graph) and its
//! default parameters.

use std::sync::OnceLock;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::params::{
    build_param_tree, fix_param_value_type, merge_params, parse_stored_params, DataType,
    ParamDecl, ParamTree,
};
use crate::{nwb, snakemake};

/// One named input or output of an algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    pub name: &'static str,
    /// Data kind carried by the port, e.g. `ImageData`, `FluoData`.
    pub data_type: &'static str,
    /// Optional inputs may be left unconnected.
    pub optional: bool,
}

impl PortSpec {
    pub const fn required(name: &'static str, data_type: &'static str) -> Self {
        Self {
            name,
            data_type,
            optional: false,
        }
    }

    pub const fn optional(name: &'static str, data_type: &'static str) -> Self {
        Self {
            name,
            data_type,
            optional: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlgorithmSpec {
    pub name: &'static str,
    /// Listing groups above the algorithm, outermost first.
    pub category: &'static [&'static str],
    /// Conda environment the task runner activates for this algorithm.
    pub conda_name: &'static str,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub params: Vec<ParamDecl>,
}

impl AlgorithmSpec {
    /// Slash-joined category path ending in the algorithm name.
    pub fn path(&self) -> String {
        let mut parts: Vec<&str> = self.category.to_vec();
        parts.push(self.name);
        parts.join("/")
    }

    pub fn default_params(&self) -> ParamTree {
        build_param_tree(&self.params)
    }
}

pub struct AlgorithmRegistry {
    algorithms: IndexMap<&'static str, AlgorithmSpec>,
}

static REGISTRY: OnceLock<AlgorithmRegistry> = OnceLock::new();

impl AlgorithmRegistry {
    /// The process-wide registry of built-in algorithms.
    pub fn global() -> &'static AlgorithmRegistry {
        REGISTRY.get_or_init(|| AlgorithmRegistry::new(builtin_algorithms()))
    }

    pub fn new(algorithms: Vec<AlgorithmSpec>) -> Self {
        Self {
            algorithms: algorithms.into_iter().map(|a| (a.name, a)).collect(),
        }
    }

    pub fn find(&self, name: &str) -> Result<&AlgorithmSpec, CoreError> {
        self.algorithms
            .get(name)
            .ok_or_else(|| CoreError::not_found("Algorithm", name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlgorithmSpec> {
        self.algorithms.values()
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }

    /// Nested category listing of every algorithm with its ports.
    pub fn algo_tree(&self) -> IndexMap<String, AlgoTreeNode> {
        let mut root: IndexMap<String, AlgoTreeNode> = IndexMap::new();
        for algo in self.algorithms.values() {
            let mut level = &mut root;
            for group in algo.category {
                let node = level
                    .entry(group.to_string())
                    .or_insert_with(|| AlgoTreeNode::Group {
                        children: IndexMap::new(),
                    });
                level = group_children(node);
            }
            level.insert(algo.name.to_string(), AlgoTreeNode::Algo(AlgoEntry::from(algo)));
        }
        root
    }
}

/// Children of a listing group, replacing an algorithm entry that collides
/// with a category name.
fn group_children(node: &mut AlgoTreeNode) -> &mut IndexMap<String, AlgoTreeNode> {
    if let AlgoTreeNode::Algo(entry) = node {
        tracing::warn!(path = %entry.path, "Category name collides with an algorithm");
        *node = AlgoTreeNode::Group {
            children: IndexMap::new(),
        };
    }
    match node {
        AlgoTreeNode::Group { children } => children,
        AlgoTreeNode::Algo(_) => unreachable!("entry replaced by group above"),
    }
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AlgoTreeNode {
    Group {
        children: IndexMap<String, AlgoTreeNode>,
    },
    Algo(AlgoEntry),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgoEntry {
    pub args: Vec<AlgoArg>,
    pub returns: Vec<AlgoReturn>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgoArg {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(rename = "isNone")]
    pub is_none: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgoReturn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

impl From<&AlgorithmSpec> for AlgoEntry {
    fn from(algo: &AlgorithmSpec) -> Self {
        Self {
            args: algo
                .inputs
                .iter()
                .map(|p| AlgoArg {
                    name: p.name.to_string(),
                    data_type: p.data_type.to_string(),
                    is_none: p.optional,
                })
                .collect(),
            returns: algo
                .outputs
                .iter()
                .map(|p| AlgoReturn {
                    name: p.name.to_string(),
                    data_type: p.data_type.to_string(),
                })
                .collect(),
            path: algo.path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default parameters
// ---------------------------------------------------------------------------

/// Canonical parameter tree for an algorithm or one of the reserved names
/// `snakemake` / `nwb`.
pub fn get_default_params(name: &str) -> Result<ParamTree, CoreError> {
    match name {
        snakemake::SNAKEMAKE_PARAMS_NAME => Ok(build_param_tree(&snakemake::param_decls())),
        nwb::NWB_PARAMS_NAME => Ok(build_param_tree(&nwb::param_decls())),
        other => Ok(AlgorithmRegistry::global().find(other)?.default_params()),
    }
}

/// Resolve a stored parameter document against the canonical tree for
/// `name`: defaults when nothing is stored, otherwise merge then type-fix.
pub fn get_type_fixed_params(stored: &Value, name: &str) -> Result<ParamTree, CoreError> {
    let defaults = get_default_params(name)?;
    let stored = parse_stored_params(stored)
        .map_err(|e| CoreError::Validation(format!("Invalid parameters for {name}: {e}")))?;
    if stored.is_empty() {
        return Ok(defaults);
    }
    let mut merged = merge_params(&stored, defaults);
    fix_param_value_type(&mut merged);
    Ok(merged)
}

// ---------------------------------------------------------------------------
// Built-in table
// ---------------------------------------------------------------------------

const IMAGE: &str = "ImageData";
const FLUO: &str = "FluoData";
const ISCELL: &str = "IscellData";
const ROI: &str = "RoiData";
const SUITE2P: &str = "Suite2pData";
const BEHAVIOR: &str = "BehaviorData";
const TIMESERIES: &str = "TimeSeriesData";

fn builtin_algorithms() -> Vec<AlgorithmSpec> {
    let mut algorithms = suite2p_algorithms();
    algorithms.extend(caiman_algorithms());
    algorithms.push(lccd_cell_detection());
    algorithms.extend(optinist_algorithms());
    algorithms
}

fn suite2p_algorithms() -> Vec<AlgorithmSpec> {
    const CATEGORY: &[&str] = &["suite2p"];
    vec![
        AlgorithmSpec {
            name: "suite2p_file_convert",
            category: CATEGORY,
            conda_name: "suite2p",
            inputs: vec![PortSpec::required("image", IMAGE)],
            outputs: vec![PortSpec::required("ops", SUITE2P)],
            params: vec![
                ParamDecl::int("nplanes", 1),
                ParamDecl::int("nchannels", 1),
                ParamDecl::bool("force_sktiff", false),
                ParamDecl::int("batch_size", 500),
            ],
        },
        AlgorithmSpec {
            name: "suite2p_registration",
            category: CATEGORY,
            conda_name: "suite2p",
            inputs: vec![PortSpec::required("ops", SUITE2P)],
            outputs: vec![PortSpec::required("ops", SUITE2P)],
            params: vec![
                ParamDecl::int("frames_include", -1),
                ParamDecl::bool("keep_movie_raw", false),
                ParamDecl::bool("do_bidiphase", false),
                ParamDecl::float("smooth_sigma", 1.15),
                ParamDecl::int("smooth_sigma_time", 0),
                ParamDecl::int("bidiphase", 0),
                ParamDecl::float("maxregshift", 0.1),
                ParamDecl::int("maxregshiftNR", 5),
                ParamDecl::bool("nonrigid", true),
                ParamDecl::list("block_size", json!([128, 128])),
                ParamDecl::float("snr_thresh", 1.2),
                ParamDecl::int("functional_chan", 1),
                ParamDecl::int("align_by_chan", 1),
                ParamDecl::bool("reg_tif", false),
                ParamDecl::float("th_badframes", 1.0),
                ParamDecl::int("diameter", 0),
                ParamDecl::bool("1Preg", false),
                ParamDecl::int("spatial_hp_reg", 42),
                ParamDecl::int("pre_smooth", 0),
                ParamDecl::int("spatial_taper", 40),
                ParamDecl::bool("bidi_corrected", false),
            ],
        },
        AlgorithmSpec {
            name: "suite2p_roi",
            category: CATEGORY,
            conda_name: "suite2p",
            inputs: vec![PortSpec::required("ops", SUITE2P)],
            outputs: vec![
                PortSpec::required("ops", SUITE2P),
                PortSpec::required("fluorescence", FLUO),
                PortSpec::required("iscell", ISCELL),
            ],
            params: vec![
                ParamDecl::float("tau", 1.0).doc("this is the main parameter for deconvolution"),
                ParamDecl::bool("soma_crop", true)
                    .doc("crop dendrites for cell classification stats like compactness"),
                ParamDecl::int("high_pass", 100)
                    .doc("running mean subtraction with window of size 'high_pass' (use low values for 1P)"),
                ParamDecl::bool("sparse_mode", true).doc("whether or not to run sparse_mode"),
                ParamDecl::float("max_overlap", 0.75).doc(
                    "cells with more overlap than this get removed during triage before refinement",
                ),
                ParamDecl::int("nbinned", 5000).doc("max number of binned frames for cell detection"),
                ParamDecl::int("spatial_scale", 0)
                    .doc("0: multi-scale; 1: 6 pixels 2: 12 pixels 3: 24 pixels 4: 48 pixels"),
                ParamDecl::float("threshold_scaling", 1.0)
                    .doc("adjust the automatically determined threshold by this scalar multiplier"),
                ParamDecl::int("max_iterations", 20)
                    .doc("maximum number of iterations to do cell detection"),
                ParamDecl::int("spatial_hp_detect", 25).doc(
                    "window for spatial high-pass filtering for neuropil subtraction before detection",
                ),
                ParamDecl::float("preclassify", 0.0)
                    .doc("apply classifier before signal extraction with probability 0.3"),
                ParamDecl::bool("allow_overlap", false).doc(
                    "pixels that are overlapping are thrown out (False) or added to both ROIs (True)",
                ),
                ParamDecl::int("inner_neuropil_radius", 2)
                    .doc("number of pixels to keep between ROI and neuropil donut"),
                ParamDecl::int("min_neuropil_pixels", 350)
                    .doc("minimum number of pixels in the neuropil"),
                ParamDecl::float("neucoeff", 0.7).doc("neuropil coefficient"),
            ],
        },
        AlgorithmSpec {
            name: "suite2p_spike_deconv",
            category: CATEGORY,
            conda_name: "suite2p",
            inputs: vec![PortSpec::required("ops", SUITE2P)],
            outputs: vec![
                PortSpec::required("ops", SUITE2P),
                PortSpec::required("spks", FLUO),
            ],
            params: vec![
                ParamDecl::str("baseline", "maximin")
                    .doc("baselining mode (can also choose 'prctile')"),
                ParamDecl::float("win_baseline", 60.0).doc("window for maximin"),
                ParamDecl::float("sig_baseline", 10.0)
                    .doc("smoothing constant for gaussian filter"),
                ParamDecl::float("prctile_baseline", 8.0)
                    .doc("optional (whether to use a percentile baseline)"),
                ParamDecl::float("neucoeff", 0.7).doc("neuropil coefficient"),
            ],
        },
    ]
}

fn caiman_algorithms() -> Vec<AlgorithmSpec> {
    const CATEGORY: &[&str] = &["caiman"];
    vec![
        AlgorithmSpec {
            name: "caiman_mc",
            category: CATEGORY,
            conda_name: "caiman",
            inputs: vec![PortSpec::required("image", IMAGE)],
            outputs: vec![PortSpec::required("mc_images", IMAGE)],
            params: vec![
                ParamDecl::str("border_nan", "copy"),
                ParamDecl::none("gSig_filt", DataType::List),
                ParamDecl::bool("is3D", false),
                ParamDecl::int("max_deviation_rigid", 3),
                ParamDecl::list("max_shifts", json!([6, 6])),
                ParamDecl::none("min_mov", DataType::Float),
                ParamDecl::int("niter_rig", 1),
                ParamDecl::bool("nonneg_movie", true),
                ParamDecl::int("num_frames_split", 80),
                ParamDecl::none("num_splits_to_process_els", DataType::Int),
                ParamDecl::none("num_splits_to_process_rig", DataType::Int),
                ParamDecl::list("overlaps", json!([32, 32])),
                ParamDecl::bool("pw_rigid", false),
                ParamDecl::bool("shifts_opencv", true),
                ParamDecl::int("splits_els", 14),
                ParamDecl::int("splits_rig", 14),
                ParamDecl::list("strides", json!([96, 96])),
                ParamDecl::int("upsample_factor_grid", 4),
                ParamDecl::bool("use_cuda", false),
            ],
        },
        AlgorithmSpec {
            name: "caiman_cnmf",
            category: CATEGORY,
            conda_name: "caiman",
            inputs: vec![PortSpec::required("images", IMAGE)],
            outputs: vec![
                PortSpec::required("fluorescence", FLUO),
                PortSpec::required("iscell", ISCELL),
            ],
            params: cnmf_params(CnmfVariant::Cnmf),
        },
        AlgorithmSpec {
            name: "caiman_cnmfe",
            category: CATEGORY,
            conda_name: "caiman",
            inputs: vec![PortSpec::required("images", IMAGE)],
            outputs: vec![
                PortSpec::required("fluorescence", FLUO),
                PortSpec::required("iscell", ISCELL),
            ],
            params: cnmf_params(CnmfVariant::Cnmfe),
        },
    ]
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CnmfVariant {
    Cnmf,
    Cnmfe,
}

/// CNMF and CNMF-E share one parameter layout; CNMF-E adds the
/// ring-model settings and uses different defaults.
fn cnmf_params(variant: CnmfVariant) -> Vec<ParamDecl> {
    let e = variant == CnmfVariant::Cnmfe;
    let mut params = vec![
        ParamDecl::bool("do_refit", false).section("init_params"),
        ParamDecl::int("K", 4)
            .doc("upper bound on number of components per patch, in general None")
            .section("init_params"),
        ParamDecl::list("gSig", if e { json!([3, 3]) } else { json!([4, 4]) })
            .doc("gaussian width of a 2D gaussian kernel, which approximates a neuron")
            .section("init_params"),
    ];
    if e {
        params.push(
            ParamDecl::list("gSiz", json!([13, 13]))
                .doc("average diameter of a neuron, in general 4*gSig+1")
                .section("init_params"),
        );
    }
    params.extend([
        ParamDecl::int("ssub", 1)
            .doc("downsampling factor in space for initialization")
            .section("init_params"),
        ParamDecl::int("tsub", 1)
            .doc("downsampling factor in time for initialization")
            .section("init_params"),
        ParamDecl::int("nb", 2)
            .doc("number of background components (rank) if positive, else exact ring model")
            .section("init_params"),
    ]);
    if e {
        params.extend([
            ParamDecl::float("min_corr", 0.8)
                .doc("min peak value from correlation image")
                .section("init_params"),
            ParamDecl::int("min_pnr", 10)
                .doc("min peak to noise ration from PNR image")
                .section("init_params"),
            ParamDecl::int("ssub_B", 2)
                .doc("additional downsampling factor in space for background")
                .section("init_params"),
            ParamDecl::float("ring_size_factor", 1.4)
                .doc("radius of ring is gSiz*ring_size_factor")
                .section("init_params"),
        ]);
    } else {
        params.push(ParamDecl::str("method_init", "greedy_roi").section("init_params"));
    }
    params.push(
        ParamDecl::int("p", 1)
            .doc("order of the autoregressive system")
            .section("preprocess_params"),
    );
    if e {
        params.push(ParamDecl::int("rf", 40).section("patch_params"));
    } else {
        params.push(ParamDecl::none("rf", DataType::Int).section("patch_params"));
    }
    params.push(
        ParamDecl::int("stride", if e { 20 } else { 6 })
            .doc("amount of overlap between the patches in pixels")
            .section("patch_params"),
    );
    if e {
        params.extend([
            ParamDecl::none("low_rank_background", DataType::Bool).section("patch_params"),
            ParamDecl::int("nb_patch", 0)
                .doc("number of background components (rank) per patch if gnb>0")
                .section("patch_params"),
        ]);
    }
    params.extend([
        ParamDecl::float("thr", 0.9).section("merge_params"),
        ParamDecl::float("merge_thr", if e { 0.7 } else { 0.85 })
            .doc("merging threshold, max correlation allowed")
            .section("merge_params"),
    ]);
    params
}

fn lccd_cell_detection() -> AlgorithmSpec {
    AlgorithmSpec {
        name: "lccd_cell_detection",
        category: &["lccd"],
        conda_name: "lccd",
        inputs: vec![PortSpec::required("mc_images", IMAGE)],
        outputs: vec![
            PortSpec::required("fluorescence", FLUO),
            PortSpec::required("cell_roi", ROI),
        ],
        params: vec![
            ParamDecl::int("filtersize1", 100).section("blob_detector"),
            ParamDecl::int("filtersize2", 4).section("blob_detector"),
            ParamDecl::float("sigma", 1.25).section("blob_detector"),
            ParamDecl::int("fsize", 30).section("blob_detector"),
            ParamDecl::int("min_area", 20).section("blob_detector"),
            ParamDecl::int("max_area", 50).section("blob_detector"),
            ParamDecl::bool("sparse", false).section("blob_detector"),
            ParamDecl::float("overlap_threshold", 0.4).section("roi_integration"),
            ParamDecl::int("min_area", 20).section("roi_integration"),
            ParamDecl::int("max_area", 100).section("roi_integration"),
            ParamDecl::bool("sparse", false).section("roi_integration"),
            ParamDecl::int("frame_divider", 100).section("lccd"),
            ParamDecl::int("f0_frames", 100).section("dff"),
            ParamDecl::int("f0_percentile", 8).section("dff"),
        ],
    }
}

fn optinist_algorithms() -> Vec<AlgorithmSpec> {
    const DIMENSION_REDUCTION: &[&str] = &["optinist", "dimension_reduction"];
    const NEURAL_DECODING: &[&str] = &["optinist", "neural_decoding"];
    const POPULATION: &[&str] = &["optinist", "neural_population_analysis"];
    const BASIC: &[&str] = &["optinist", "basic_neural_analysis"];

    let fluo_inputs = || {
        vec![
            PortSpec::required("neural_data", FLUO),
            PortSpec::optional("iscell", ISCELL),
        ]
    };
    let decoding_inputs = || {
        vec![
            PortSpec::required("neural_data", FLUO),
            PortSpec::required("behaviors_data", BEHAVIOR),
            PortSpec::optional("iscell", ISCELL),
        ]
    };
    let standardize = |prefix: &str| -> Vec<ParamDecl> {
        if prefix == "x" {
            vec![
                ParamDecl::bool("standard_x_mean", true),
                ParamDecl::bool("standard_x_std", true),
            ]
        } else {
            vec![
                ParamDecl::bool("standard_mean", true),
                ParamDecl::bool("standard_std", true),
            ]
        }
    };

    let mut pca = standardize("");
    pca.extend([
        ParamDecl::bool("transpose", true),
        ParamDecl::int("n_components", 2).section("PCA"),
        ParamDecl::bool("copy", true).section("PCA"),
        ParamDecl::bool("whiten", false).section("PCA"),
        ParamDecl::str("svd_solver", "auto").section("PCA"),
        ParamDecl::float("tol", 0.0).section("PCA"),
        ParamDecl::str("iterated_power", "auto").section("PCA"),
    ]);

    let mut tsne = standardize("");
    tsne.extend([
        ParamDecl::bool("transpose", true),
        ParamDecl::int("n_components", 2).section("TSNE"),
        ParamDecl::float("perplexity", 30.0).section("TSNE"),
        ParamDecl::float("early_exaggeration", 12.0).section("TSNE"),
        ParamDecl::str("learning_rate", "warn").section("TSNE"),
        ParamDecl::int("n_iter", 1000).section("TSNE"),
        ParamDecl::int("n_iter_without_progress", 300).section("TSNE"),
        ParamDecl::float("min_grad_norm", 1e-7).section("TSNE"),
        ParamDecl::str("metric", "euclidean").section("TSNE"),
        ParamDecl::str("init", "warn").section("TSNE"),
        ParamDecl::int("random_state", 0).section("TSNE"),
        ParamDecl::str("method", "barnes_hut").section("TSNE"),
        ParamDecl::float("angle", 0.5).section("TSNE"),
        ParamDecl::int("n_jobs", 1).section("TSNE"),
        ParamDecl::str("square_distances", "legacy").section("TSNE"),
    ]);

    let mut glm = standardize("x");
    glm.extend([
        ParamDecl::bool("standard_y_mean", true),
        ParamDecl::bool("standard_y_std", true),
        ParamDecl::bool("transpose_x", true),
        ParamDecl::bool("transpose_y", false),
        ParamDecl::int("target_index", 0),
        ParamDecl::bool("add_constant", false),
        ParamDecl::str("link", "log"),
        ParamDecl::str("family", "Gaussian"),
        ParamDecl::none("offset", DataType::List).section("GLM"),
        ParamDecl::none("exposure", DataType::List).section("GLM"),
        ParamDecl::none("missing", DataType::Str).section("GLM"),
    ]);

    let mut lda = standardize("x");
    lda.extend([
        ParamDecl::bool("transpose_x", true),
        ParamDecl::bool("transpose_y", false),
        ParamDecl::int("target_index", 1),
        ParamDecl::int("n_splits", 5)
            .doc("Number of folds. Must be at least 2.")
            .section("CV"),
        ParamDecl::bool("shuffle", false).section("CV"),
        ParamDecl::str("solver", "svd").section("LDA"),
        ParamDecl::none("shrinkage", DataType::Str).section("LDA"),
        ParamDecl::none("priors", DataType::List).section("LDA"),
        ParamDecl::none("n_components", DataType::Int).section("LDA"),
        ParamDecl::bool("store_covariance", false).section("LDA"),
        ParamDecl::float("tol", 0.0001).section("LDA"),
        ParamDecl::none("covariance_estimator", DataType::Str).section("LDA"),
    ]);

    let mut svm = standardize("x");
    svm.extend([
        ParamDecl::bool("transpose_x", true),
        ParamDecl::bool("transpose_y", false),
        ParamDecl::int("target_index", 1),
        ParamDecl::bool("use_grid_search", true),
        ParamDecl::list("C", json!([0.001, 0.01, 0.1])).section("grid_search/param_grid"),
        ParamDecl::list("kernel", json!(["linear"])).section("grid_search/param_grid"),
        ParamDecl::list("degree", json!([3])).section("grid_search/param_grid"),
        ParamDecl::list("gamma", json!(["scale"])).section("grid_search/param_grid"),
        ParamDecl::list("coef0", json!([0.0])).section("grid_search/param_grid"),
        ParamDecl::list("shrinking", json!([true])).section("grid_search/param_grid"),
        ParamDecl::list("tol", json!([0.001])).section("grid_search/param_grid"),
        ParamDecl::list("decision_function_shape", json!(["ovr"]))
            .section("grid_search/param_grid"),
        ParamDecl::str("scoring", "accuracy").section("grid_search/CV"),
        ParamDecl::int("n_jobs", 1).section("grid_search/CV"),
        ParamDecl::bool("refit", true).section("grid_search/CV"),
        ParamDecl::none("cv", DataType::Int).section("grid_search/CV"),
        ParamDecl::int("verbose", 3).section("grid_search/CV"),
        ParamDecl::str("pre_dispatch", "2*n_jobs").section("grid_search/CV"),
        ParamDecl::int("error_score", -1_000_000).section("grid_search/CV"),
        ParamDecl::bool("return_train_score", false).section("grid_search/CV"),
        ParamDecl::int("n_splits", 5).section("CV"),
        ParamDecl::bool("shuffle", true).section("CV"),
        ParamDecl::float("C", 1.0).section("SVC"),
        ParamDecl::str("kernel", "rbf").section("SVC"),
        ParamDecl::int("degree", 3).section("SVC"),
        ParamDecl::str("gamma", "scale").section("SVC"),
        ParamDecl::float("coef0", 0.0).section("SVC"),
        ParamDecl::bool("shrinking", true).section("SVC"),
        ParamDecl::bool("probability", false).section("SVC"),
        ParamDecl::float("tol", 0.001).section("SVC"),
        ParamDecl::float("cache_size", 200.0).section("SVC"),
        ParamDecl::none("class_weight", DataType::Dict).section("SVC"),
        ParamDecl::int("max_iter", -1).section("SVC"),
        ParamDecl::str("decision_function_shape", "ovr").section("SVC"),
        ParamDecl::bool("break_ties", false).section("SVC"),
        ParamDecl::int("random_state", 0).section("SVC"),
    ]);

    vec![
        AlgorithmSpec {
            name: "pca",
            category: DIMENSION_REDUCTION,
            conda_name: "optinist",
            inputs: fluo_inputs(),
            outputs: vec![],
            params: pca,
        },
        AlgorithmSpec {
            name: "tsne",
            category: DIMENSION_REDUCTION,
            conda_name: "optinist",
            inputs: fluo_inputs(),
            outputs: vec![],
            params: tsne,
        },
        AlgorithmSpec {
            name: "glm",
            category: NEURAL_DECODING,
            conda_name: "optinist",
            inputs: decoding_inputs(),
            outputs: vec![],
            params: glm,
        },
        AlgorithmSpec {
            name: "lda",
            category: NEURAL_DECODING,
            conda_name: "optinist",
            inputs: decoding_inputs(),
            outputs: vec![],
            params: lda,
        },
        AlgorithmSpec {
            name: "svm",
            category: NEURAL_DECODING,
            conda_name: "optinist",
            inputs: decoding_inputs(),
            outputs: vec![],
            params: svm,
        },
        AlgorithmSpec {
            name: "correlation",
            category: POPULATION,
            conda_name: "optinist",
            inputs: fluo_inputs(),
            outputs: vec![],
            params: vec![ParamDecl::bool("transpose", true)],
        },
        AlgorithmSpec {
            name: "cell_grouping",
            category: BASIC,
            conda_name: "optinist",
            inputs: vec![PortSpec::required("neural_data", TIMESERIES)],
            outputs: vec![],
            params: vec![
                ParamDecl::bool("transpose", false),
                ParamDecl::float("threshold", 1.0),
                ParamDecl::int("start_time", -10),
                ParamDecl::int("end_time", 0),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{to_key_value, ParamNode};
    use assert_matches::assert_matches;

    #[test]
    fn find_known_and_unknown() {
        let registry = AlgorithmRegistry::global();
        let mc = registry.find("caiman_mc").unwrap();
        assert_eq!(mc.conda_name, "caiman");
        assert_eq!(mc.path(), "caiman/caiman_mc");

        assert_matches!(
            registry.find("does_not_exist"),
            Err(CoreError::NotFound { entity: "Algorithm", .. })
        );
    }

    #[test]
    fn names_are_unique() {
        let registry = AlgorithmRegistry::global();
        assert_eq!(registry.len(), builtin_algorithms().len());
    }

    #[test]
    fn caiman_mc_defaults() {
        let tree = get_default_params("caiman_mc").unwrap();
        let kv = to_key_value(&tree);
        assert_eq!(kv["border_nan"], json!("copy"));
        assert_eq!(kv["max_shifts"], json!([6, 6]));
        assert_eq!(kv["min_mov"], Value::Null);
        assert_eq!(kv["splits_rig"], json!(14));
        assert_eq!(kv["use_cuda"], json!(false));
    }

    #[test]
    fn pca_nests_estimator_section() {
        let tree = get_default_params("pca").unwrap();
        assert_matches!(&tree["PCA"], ParamNode::Parent(group) => {
            assert_matches!(&group.children["n_components"], ParamNode::Child(c) => {
                assert_eq!(c.value, json!(2));
                assert_eq!(c.path, "PCA/n_components");
            });
        });
    }

    #[test]
    fn cnmfe_has_ring_model_params_cnmf_does_not() {
        let cnmfe = to_key_value(&get_default_params("caiman_cnmfe").unwrap());
        let cnmf = to_key_value(&get_default_params("caiman_cnmf").unwrap());
        assert_eq!(cnmfe["init_params"]["gSiz"], json!([13, 13]));
        assert!(cnmf["init_params"].get("gSiz").is_none());
        assert_eq!(cnmf["merge_params"]["merge_thr"], json!(0.85));
        assert_eq!(cnmfe["merge_params"]["merge_thr"], json!(0.7));
    }

    #[test]
    fn reserved_names_resolve() {
        let smk = to_key_value(&get_default_params("snakemake").unwrap());
        assert_eq!(smk["cores"], json!(2));

        let nwb = to_key_value(&get_default_params("nwb").unwrap());
        assert_eq!(nwb["session_description"], json!("optinist"));
        assert_eq!(nwb["ophys"]["plane_segmentation"]["name"], json!("PlaneSegmentation"));
    }

    #[test]
    fn type_fixed_params_merge_stored_values() {
        let tree = get_type_fixed_params(&json!({"cores": "4", "stale": 1}), "snakemake").unwrap();
        let kv = to_key_value(&tree);
        assert_eq!(kv["cores"], json!(4));
        assert!(kv.get("stale").is_none());
    }

    #[test]
    fn type_fixed_params_empty_stored_gives_defaults() {
        let tree = get_type_fixed_params(&Value::Null, "nwb").unwrap();
        assert_eq!(tree, get_default_params("nwb").unwrap());
    }

    #[test]
    fn algo_tree_nests_categories() {
        let tree = AlgorithmRegistry::global().algo_tree();
        let json = serde_json::to_value(&tree).unwrap();

        let mc = &json["caiman"]["children"]["caiman_mc"];
        assert_eq!(mc["path"], "caiman/caiman_mc");
        assert_eq!(mc["args"][0], json!({"name": "image", "type": "ImageData", "isNone": false}));
        assert_eq!(mc["returns"][0], json!({"name": "mc_images", "type": "ImageData"}));

        let pca = &json["optinist"]["children"]["dimension_reduction"]["children"]["pca"];
        assert_eq!(pca["path"], "optinist/dimension_reduction/pca");
        assert_eq!(pca["args"][1]["isNone"], true);
    }
}
