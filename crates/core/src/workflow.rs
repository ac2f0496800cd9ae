//! Workflow graph as drawn on the canvas.

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::registry::{get_type_fixed_params, AlgorithmRegistry};
use crate::types::NodeId;

/// Separator inside edge handles: `<node>--<port>--<data type>`.
const HANDLE_SEPARATOR: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    ImageFileNode,
    CsvFileNode,
    FluoFileNode,
    BehaviorFileNode,
    #[serde(rename = "HDF5FileNode")]
    Hdf5FileNode,
    AlgorithmNode,
}

impl NodeType {
    pub fn is_algorithm(self) -> bool {
        self == NodeType::AlgorithmNode
    }
}

/// A single file path or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodePath {
    Single(String),
    Multiple(Vec<String>),
}

impl NodePath {
    pub fn paths(&self) -> Vec<&str> {
        match self {
            NodePath::Single(path) => vec![path.as_str()],
            NodePath::Multiple(paths) => paths.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    /// Parameter tree for algorithm nodes, free-form settings for file nodes.
    #[serde(default)]
    pub param: Value,
    #[serde(default)]
    pub path: Option<NodePath>,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(rename = "fileType", default)]
    pub file_type: Option<String>,
    #[serde(rename = "hdf5Path", default)]
    pub hdf5_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub data: NodeData,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    #[serde(rename = "type", default)]
    pub edge_type: Option<String>,
    #[serde(default)]
    pub animated: bool,
    pub source: NodeId,
    #[serde(default)]
    pub source_handle: Option<String>,
    pub target: NodeId,
    #[serde(default)]
    pub target_handle: Option<String>,
    #[serde(default)]
    pub style: Style,
}

impl Edge {
    /// Output port name on the source node.
    pub fn source_port(&self) -> Option<&str> {
        self.source_handle.as_deref().map(handle_port)
    }

    /// Input port name on the target node.
    pub fn target_port(&self) -> Option<&str> {
        self.target_handle.as_deref().map(handle_port)
    }
}

/// Port name of a handle. Handles without separators are the port name.
pub fn handle_port(handle: &str) -> &str {
    let mut parts = handle.split(HANDLE_SEPARATOR);
    match (parts.next(), parts.next()) {
        (Some(_), Some(port)) => port,
        _ => handle,
    }
}

/// A node/edge graph. Persisted as `workflow.yaml` and embedded in the
/// experiment file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    #[serde(rename = "nodeDict", default)]
    pub node_dict: IndexMap<NodeId, Node>,
    #[serde(rename = "edgeDict", default)]
    pub edge_dict: IndexMap<String, Edge>,
}

/// The reusable workflow document: a graph with no execution state.
pub type WorkflowConfig = WorkflowGraph;

impl WorkflowGraph {
    pub fn new(node_dict: IndexMap<NodeId, Node>, edge_dict: IndexMap<String, Edge>) -> Self {
        Self {
            node_dict,
            edge_dict,
        }
    }

    pub fn algorithm_nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_dict.values().filter(|n| n.node_type.is_algorithm())
    }

    /// Edges whose target is `node_id`.
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edge_dict.values().filter(move |e| e.target == node_id)
    }

    /// Check the graph and return its nodes in dependency order.
    ///
    /// Fails when an edge references an unknown node, when an algorithm node
    /// names an unregistered algorithm or misses a required input, or when
    /// the graph has a cycle.
    pub fn validate(&self) -> Result<Vec<NodeId>, CoreError> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for id in self.node_dict.keys() {
            graph.add_node(id.as_str());
        }
        for edge in self.edge_dict.values() {
            for endpoint in [&edge.source, &edge.target] {
                if !self.node_dict.contains_key(endpoint) {
                    return Err(CoreError::Validation(format!(
                        "Edge {} references unknown node {endpoint}",
                        edge.id
                    )));
                }
            }
            graph.add_edge(edge.source.as_str(), edge.target.as_str(), ());
        }

        let registry = AlgorithmRegistry::global();
        for node in self.algorithm_nodes() {
            let algo = registry.find(&node.data.label)?;
            for port in algo.inputs.iter().filter(|p| !p.optional) {
                let connected = self
                    .incoming(&node.id)
                    .any(|e| e.target_port().map_or(true, |name| name == port.name));
                if !connected {
                    return Err(CoreError::Validation(format!(
                        "Node {} ({}) is missing required input {}",
                        node.id, algo.name, port.name
                    )));
                }
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            CoreError::Validation(format!(
                "Workflow contains a cycle through node {}",
                cycle.node_id()
            ))
        })?;
        Ok(order.into_iter().map(str::to_string).collect())
    }

    /// Replace every algorithm node's stored parameters with the result of
    /// merging them onto the algorithm's defaults.
    pub fn with_default_params(mut self) -> Result<Self, CoreError> {
        for node in self.node_dict.values_mut() {
            if !node.node_type.is_algorithm() {
                continue;
            }
            let tree = get_type_fixed_params(&node.data.param, &node.data.label)?;
            node.data.param =
                serde_json::to_value(tree).map_err(|e| CoreError::Internal(e.to_string()))?;
        }
        Ok(self)
    }
}
