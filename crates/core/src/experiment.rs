//! Persisted run records.
//!
//! One [`ExptConfig`] per run, holding one [`ExptFunction`] per node. The
//! record is created when a run is dispatched and updated as node results
//! are collected.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::params::{deserialize_stored, ParamTree};
use crate::types::{NodeId, RunId, WorkspaceId};
use crate::workflow::{Edge, Node, WorkflowGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Running,
    Success,
    Error,
}

impl NodeStatus {
    pub fn is_running(self) -> bool {
        self == NodeStatus::Running
    }
}

fn default_status() -> NodeStatus {
    NodeStatus::Running
}

fn default_run_status() -> Option<NodeStatus> {
    Some(NodeStatus::Running)
}

/// How the frontend renders an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Images,
    Timeseries,
    Heatmap,
    Roi,
    Scatter,
    Bar,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPath {
    pub path: String,
    #[serde(rename = "type")]
    pub output_type: OutputType,
    #[serde(default)]
    pub max_index: Option<u64>,
}

pub type OutputPaths = IndexMap<String, OutputPath>;

/// Execution record for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExptFunction {
    pub unique_id: NodeId,
    pub name: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default = "default_status")]
    pub success: NodeStatus,
    #[serde(rename = "hasNWB", default)]
    pub has_nwb: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "outputPaths", default)]
    pub output_paths: Option<OutputPaths>,
}

impl ExptFunction {
    /// A freshly dispatched node.
    pub fn running(unique_id: impl Into<NodeId>, name: impl Into<String>, started_at: String) -> Self {
        Self {
            unique_id: unique_id.into(),
            name: name.into(),
            started_at: Some(started_at),
            finished_at: None,
            success: NodeStatus::Running,
            has_nwb: false,
            message: None,
            output_paths: None,
        }
    }

    /// Store a terminal outcome.
    pub fn record(&mut self, message: &Message, finished_at: String) {
        self.finished_at = Some(finished_at);
        self.success = message.status;
        self.message = Some(message.message.clone());
        self.output_paths = message.output_paths.clone();
    }
}

/// Execution record for one run.
///
/// `success` is `Some(Running)` when the key is absent from the stored
/// document and `None` when it is stored as `null` (dispatched, not yet
/// aggregated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExptConfig {
    pub workspace_id: WorkspaceId,
    pub unique_id: RunId,
    pub name: String,
    pub started_at: String,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default = "default_run_status")]
    pub success: Option<NodeStatus>,
    #[serde(rename = "hasNWB")]
    pub has_nwb: bool,
    pub function: IndexMap<NodeId, ExptFunction>,
    #[serde(rename = "nodeDict", default, skip_serializing_if = "IndexMap::is_empty")]
    pub node_dict: IndexMap<NodeId, Node>,
    #[serde(rename = "edgeDict", default, skip_serializing_if = "IndexMap::is_empty")]
    pub edge_dict: IndexMap<String, Edge>,
    #[serde(default, deserialize_with = "deserialize_stored")]
    pub nwb: ParamTree,
    #[serde(default, deserialize_with = "deserialize_stored")]
    pub snakemake: ParamTree,
}

impl ExptConfig {
    /// Fold node statuses into the run status.
    ///
    /// Does nothing while any node is still running. Otherwise sets
    /// `finished_at` and `success`, with any error winning over success.
    /// Returns whether the run is finished.
    pub fn aggregate(&mut self, now: String) -> bool {
        if self.function.values().any(|f| f.success.is_running()) {
            return false;
        }
        let any_error = self
            .function
            .values()
            .any(|f| f.success == NodeStatus::Error);
        self.finished_at = Some(now);
        self.success = Some(if any_error {
            NodeStatus::Error
        } else {
            NodeStatus::Success
        });
        true
    }

    /// The graph this run executed.
    pub fn graph(&self) -> WorkflowGraph {
        WorkflowGraph::new(self.node_dict.clone(), self.edge_dict.clone())
    }

    /// Drop the embedded graph, as listings do.
    pub fn without_graph(mut self) -> Self {
        self.node_dict.clear();
        self.edge_dict.clear();
        self
    }
}

/// Per-node outcome returned to a polling client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub status: NodeStatus,
    pub message: String,
    #[serde(rename = "outputPaths", default)]
    pub output_paths: Option<OutputPaths>,
}

impl Message {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: NodeStatus::Error,
            message: message.into(),
            output_paths: None,
        }
    }

    pub fn success(function: &str, output_paths: OutputPaths) -> Self {
        Self {
            status: NodeStatus::Success,
            message: format!("{function} success"),
            output_paths: Some(output_paths),
        }
    }
}
