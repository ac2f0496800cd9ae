//! Run preparation and dispatch.
//!
//! [`WorkflowRunner::run`] turns a submitted graph into the three files of a
//! run directory and hands the task graph to a [`TaskExecutor`] in the
//! background. Completion is observed later through
//! [`crate::collator::WorkflowResult`].

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use studio_core::error::CoreError;
use studio_core::experiment::{ExptConfig, ExptFunction};
use studio_core::nwb::NWB_PARAMS_NAME;
use studio_core::params::{parse_stored_params, to_key_value, ParamTree};
use studio_core::registry::{get_type_fixed_params, AlgorithmRegistry};
use studio_core::snakemake::{ForceRun, SmkParam, SNAKEMAKE_PARAMS_NAME};
use studio_core::types::{now_timestamp, NodeId, RunId};
use studio_core::workflow::{Edge, Node, WorkflowGraph};
use tokio_util::task::TaskTracker;

use crate::error::PipelineError;
use crate::executor::{TaskExecutor, TaskJob};
use crate::layout::{DataDir, RunDir};
use crate::store::{write_yaml, ExptConfigWriter, WorkflowConfigWriter};

/// Body of a run request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "nodeDict", default)]
    pub node_dict: IndexMap<NodeId, Node>,
    #[serde(rename = "edgeDict", default)]
    pub edge_dict: IndexMap<String, Edge>,
    #[serde(rename = "snakemakeParam", default)]
    pub snakemake_param: Value,
    #[serde(rename = "nwbParam", default)]
    pub nwb_param: Value,
    #[serde(rename = "forceRunList", default)]
    pub force_run_list: Vec<ForceRun>,
}

/// Either the node id a file rule publishes under, or an algorithm rule's
/// upstream port to local argument mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReturnArg {
    Name(String),
    Ports(IndexMap<String, String>),
}

/// One step of the task graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub input: Vec<String>,
    pub return_arg: ReturnArg,
    pub params: Value,
    pub output: String,
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nwbfile: Option<Value>,
    #[serde(rename = "hdf5Path", default, skip_serializing_if = "Option::is_none")]
    pub hdf5_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Conda environment the rule runs in when `use_conda` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conda_name: Option<String>,
}

/// Contents of `snakemake.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    pub rules: IndexMap<NodeId, Rule>,
    pub last_output: Vec<String>,
}

/// Prepares run directories and dispatches them to an executor.
pub struct WorkflowRunner {
    data: DataDir,
    executor: Arc<dyn TaskExecutor>,
    tracker: TaskTracker,
}

impl WorkflowRunner {
    pub fn new(data: DataDir, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            data,
            executor,
            tracker: TaskTracker::new(),
        }
    }

    /// Start a run under `unique_id` and return as soon as it is dispatched.
    ///
    /// Reusing an existing id re-runs into the same directory: result
    /// artifacts of forced nodes and everything downstream of them are
    /// removed first, along with the previous error log.
    pub async fn run(&self, workspace_id: &str, unique_id: &str, item: RunItem) -> Result<RunId, PipelineError> {
        let run = self.data.run(workspace_id, unique_id)?;
        let graph = WorkflowGraph::new(item.node_dict, item.edge_dict);
        graph.validate()?;
        let graph = graph.with_default_params()?;

        let smk_tree = get_type_fixed_params(&item.snakemake_param, SNAKEMAKE_PARAMS_NAME)?;
        let nwb_tree = get_type_fixed_params(&item.nwb_param, NWB_PARAMS_NAME)?;
        let smk = SmkParam::from_tree(&smk_tree, item.force_run_list)?;

        let flow = self.flow_config(&run, &graph, &nwb_tree)?;
        let forced = forced_nodes(&graph, &smk);
        let forcerun_targets = forced
            .iter()
            .filter_map(|id| flow.rules.get(id))
            .map(|rule| rule.output.clone())
            .collect();

        if run.exists().await {
            clear_stale_outputs(&run, &graph, &flow, &forced).await?;
        }

        let started_at = now_timestamp();
        let function = graph
            .node_dict
            .values()
            .map(|node| {
                let f = ExptFunction::running(node.id.clone(), function_name(node), started_at.clone());
                (node.id.clone(), f)
            })
            .collect();
        let expt = ExptConfig {
            workspace_id: workspace_id.to_string(),
            unique_id: unique_id.to_string(),
            name: item.name.unwrap_or_else(|| unique_id.to_string()),
            started_at,
            finished_at: None,
            success: None,
            has_nwb: false,
            function,
            node_dict: graph.node_dict.clone(),
            edge_dict: graph.edge_dict.clone(),
            nwb: nwb_tree,
            snakemake: smk_tree,
        };

        write_yaml(&run.snakemake_file(), &flow).await?;
        WorkflowConfigWriter::write(&run.workflow_file(), &graph).await?;
        ExptConfigWriter::write(&run.experiment_file(), &expt).await?;

        let job = TaskJob {
            workspace_id: workspace_id.to_string(),
            unique_id: unique_id.to_string(),
            run_dir: run.path().to_path_buf(),
            config_file: run.snakemake_file(),
            error_log: run.error_log(),
            smk,
            targets: flow.last_output.clone(),
            forcerun_targets,
        };
        tracing::info!(
            workspace_id,
            unique_id,
            nodes = expt.function.len(),
            "Run dispatched"
        );

        let executor = Arc::clone(&self.executor);
        self.tracker.spawn(async move {
            let (workspace_id, unique_id) = (job.workspace_id.clone(), job.unique_id.clone());
            if let Err(e) = executor.execute(job).await {
                tracing::error!(%workspace_id, %unique_id, error = %e, "Run failed");
            }
        });

        Ok(unique_id.to_string())
    }

    /// Wait up to `timeout` for dispatched runs to finish.
    pub async fn shutdown(&self, timeout: Duration) {
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                pending = self.tracker.len(),
                "Timed out waiting for dispatched runs"
            );
        }
    }

    fn flow_config(&self, run: &RunDir, graph: &WorkflowGraph, nwb: &ParamTree) -> Result<FlowConfig, PipelineError> {
        let nwbfile = Value::Object(to_key_value(nwb));
        let mut rules = IndexMap::new();
        for node in graph.node_dict.values() {
            let output = path_string(&run.result_file(&node.id, &function_name(node))?);
            let rule = if node.node_type.is_algorithm() {
                self.algorithm_rule(run, graph, node, output, &nwbfile)?
            } else {
                self.file_rule(node, output, &nwbfile)
            };
            rules.insert(node.id.clone(), rule);
        }

        let mut last_output = Vec::new();
        for (id, rule) in &rules {
            if !graph.edge_dict.values().any(|e| &e.source == id) {
                last_output.push(rule.output.clone());
            }
        }
        Ok(FlowConfig { rules, last_output })
    }

    fn file_rule(&self, node: &Node, output: String, nwbfile: &Value) -> Rule {
        let input = node
            .data
            .path
            .as_ref()
            .map(|p| p.paths().into_iter().map(|path| self.resolve_input(path)).collect())
            .unwrap_or_default();
        Rule {
            input,
            return_arg: ReturnArg::Name(node.id.clone()),
            params: node.data.param.clone(),
            output,
            rule_type: node.data.data_type.clone(),
            nwbfile: Some(nwbfile.clone()),
            hdf5_path: node.data.hdf5_path.clone(),
            path: None,
            conda_name: None,
        }
    }

    fn algorithm_rule(
        &self,
        run: &RunDir,
        graph: &WorkflowGraph,
        node: &Node,
        output: String,
        nwbfile: &Value,
    ) -> Result<Rule, PipelineError> {
        let algo = AlgorithmRegistry::global().find(&node.data.label)?;

        let mut input = Vec::new();
        let mut return_arg = IndexMap::new();
        for edge in graph.incoming(&node.id) {
            let source = &graph.node_dict[&edge.source];
            let source_output = path_string(&run.result_file(&source.id, &function_name(source))?);
            if !input.contains(&source_output) {
                input.push(source_output);
            }
            if let (Some(from), Some(to)) = (edge.source_port(), edge.target_port()) {
                return_arg.insert(from.to_string(), to.to_string());
            }
        }

        let params = parse_stored_params(&node.data.param)
            .map_err(|e| CoreError::Validation(format!("Invalid parameters for {}: {e}", node.id)))?;
        Ok(Rule {
            input,
            return_arg: ReturnArg::Ports(return_arg),
            params: Value::Object(to_key_value(&params)),
            output,
            rule_type: algo.name.to_string(),
            nwbfile: Some(nwbfile.clone()),
            hdf5_path: None,
            path: Some(algo.path()),
            conda_name: Some(algo.conda_name.to_string()),
        })
    }

    fn resolve_input(&self, path: &str) -> String {
        let path = Path::new(path);
        if path.is_absolute() {
            path_string(path)
        } else {
            path_string(&self.data.input_dir().join(path))
        }
    }
}

/// Name a node's result artifact is stored under: the algorithm name, or
/// the file stem of an input node's label.
fn function_name(node: &Node) -> String {
    if node.node_type.is_algorithm() {
        return node.data.label.clone();
    }
    Path::new(&node.data.label)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| node.id.clone())
}

/// Nodes whose artifacts must be rebuilt: every node with `forceall`,
/// otherwise the requested nodes that exist in the graph.
fn forced_nodes(graph: &WorkflowGraph, smk: &SmkParam) -> Vec<NodeId> {
    if smk.forceall {
        return graph.node_dict.keys().cloned().collect();
    }
    smk.forcerun
        .iter()
        .filter(|f| graph.node_dict.contains_key(&f.node_id))
        .map(|f| f.node_id.clone())
        .collect()
}

/// `roots` and every node reachable from them.
fn downstream(graph: &WorkflowGraph, roots: &[NodeId]) -> HashSet<NodeId> {
    let mut seen: HashSet<NodeId> = roots.iter().cloned().collect();
    let mut queue: VecDeque<NodeId> = roots.iter().cloned().collect();
    while let Some(id) = queue.pop_front() {
        for edge in graph.edge_dict.values().filter(|e| e.source == id) {
            if seen.insert(edge.target.clone()) {
                queue.push_back(edge.target.clone());
            }
        }
    }
    seen
}

async fn clear_stale_outputs(
    run: &RunDir,
    graph: &WorkflowGraph,
    flow: &FlowConfig,
    forced: &[NodeId],
) -> Result<(), PipelineError> {
    remove_if_exists(&run.error_log()).await?;
    for node_id in downstream(graph, forced) {
        if let Some(rule) = flow.rules.get(&node_id) {
            remove_if_exists(Path::new(&rule.output)).await?;
            tracing::debug!(unique_id = run.unique_id(), node_id = %node_id, "Cleared stale result");
        }
    }
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), PipelineError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::io(path)(e)),
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
