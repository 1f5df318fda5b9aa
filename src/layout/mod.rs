//! Layout kinds, the provider seam, and the local hierarchical-tree algorithm.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;
use crate::graph::{GraphIndex, NodeId, Position};

pub mod builtin;
mod force;
pub mod hierarchy;
pub mod orchestrator;

pub type Positions = HashMap<NodeId, Position>;
pub type LayoutOutcome = Result<Positions, LayoutError>;
pub type LayoutCallback = Box<dyn FnOnce(LayoutOutcome) + Send + 'static>;

/// Executes a layout somewhere else and reports back exactly once through `on_complete`.
pub trait LayoutProvider: Send {
    fn run(&mut self, job: LayoutJob, on_complete: LayoutCallback);

    /// Called when the orchestrator gives up on a run. Providers may ignore it.
    fn cancel(&mut self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub spacing: f32,
    pub columns: Option<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            spacing: 120.0,
            columns: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleConfig {
    pub radius: Option<f32>,
    pub min_spacing: f32,
}

impl Default for CircleConfig {
    fn default() -> Self {
        Self {
            radius: None,
            min_spacing: 80.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcentricConfig {
    pub ring_spacing: f32,
}

impl Default for ConcentricConfig {
    fn default() -> Self {
        Self {
            ring_spacing: 140.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    pub iterations: usize,
}

impl ForceConfig {
    pub fn with_iterations(iterations: usize) -> Self {
        Self { iterations }
    }
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self::with_iterations(300)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayeredConfig {
    pub layer_spacing: f32,
    pub node_spacing: f32,
}

impl Default for LayeredConfig {
    fn default() -> Self {
        Self {
            layer_spacing: 100.0,
            node_spacing: 60.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub root: Option<NodeId>,
    pub min_level_height: f32,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            root: None,
            min_level_height: 120.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum LayoutKind {
    Grid(GridConfig),
    Circle(CircleConfig),
    Concentric(ConcentricConfig),
    Cose(ForceConfig),
    Fcose(ForceConfig),
    Elk(LayeredConfig),
    Klay(LayeredConfig),
    Cise(ForceConfig),
    Cola(ForceConfig),
    Spread(ForceConfig),
    HierarchicalTree(HierarchyConfig),
}

impl LayoutKind {
    pub const NAMES: [&'static str; 11] = [
        "grid",
        "circle",
        "concentric",
        "cose",
        "fcose",
        "elk",
        "klay",
        "cise",
        "cola",
        "spread",
        "hierarchical-tree",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Grid(_) => "grid",
            Self::Circle(_) => "circle",
            Self::Concentric(_) => "concentric",
            Self::Cose(_) => "cose",
            Self::Fcose(_) => "fcose",
            Self::Elk(_) => "elk",
            Self::Klay(_) => "klay",
            Self::Cise(_) => "cise",
            Self::Cola(_) => "cola",
            Self::Spread(_) => "spread",
            Self::HierarchicalTree(_) => "hierarchical-tree",
        }
    }

    /// The kind with its default configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "grid" => Self::Grid(GridConfig::default()),
            "circle" => Self::Circle(CircleConfig::default()),
            "concentric" => Self::Concentric(ConcentricConfig::default()),
            "cose" => Self::Cose(ForceConfig::with_iterations(300)),
            "fcose" => Self::Fcose(ForceConfig::with_iterations(180)),
            "elk" => Self::Elk(LayeredConfig::default()),
            "klay" => Self::Klay(LayeredConfig::default()),
            "cise" => Self::Cise(ForceConfig::with_iterations(220)),
            "cola" => Self::Cola(ForceConfig::with_iterations(400)),
            "spread" => Self::Spread(ForceConfig::with_iterations(120)),
            "hierarchical-tree" | "hierarchy" => Self::HierarchicalTree(HierarchyConfig::default()),
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_hierarchical(&self) -> bool {
        matches!(self, Self::HierarchicalTree(_))
    }
}

impl Default for LayoutKind {
    fn default() -> Self {
        Self::Cose(ForceConfig::default())
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayoutKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_name(&value.to_ascii_lowercase()).ok_or_else(|| {
            format!(
                "unknown layout kind {value:?}, expected one of: {}",
                Self::NAMES.join(", ")
            )
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutNode {
    pub id: NodeId,
    pub is_group: bool,
}

/// The visible part of the graph handed to a layout run.
#[derive(Clone, Debug)]
pub struct LayoutJob {
    pub kind: LayoutKind,
    pub viewport: Viewport,
    /// Ordered by node id.
    pub nodes: Vec<LayoutNode>,
    /// Endpoint pairs of visible edges, ordered by edge id.
    pub edges: Vec<(NodeId, NodeId)>,
}

impl LayoutJob {
    pub fn from_visible(graph: &GraphIndex, kind: LayoutKind, viewport: Viewport) -> Self {
        let nodes = graph
            .visible_node_ids()
            .into_iter()
            .filter_map(|id| graph.node(&id))
            .map(|node| LayoutNode {
                id: node.id.clone(),
                is_group: node.is_group(),
            })
            .collect();

        let edges = graph
            .visible_edge_ids()
            .into_iter()
            .filter_map(|id| graph.edge(&id))
            .map(|edge| (edge.source.clone(), edge.target.clone()))
            .collect();

        Self {
            kind,
            viewport,
            nodes,
            edges,
        }
    }

    /// Edge endpoints as indices into `nodes`, skipping edges that leave the job.
    pub fn indexed_edges(&self) -> Vec<(usize, usize)> {
        let index_by_id = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.as_str(), index))
            .collect::<HashMap<_, _>>();

        self.edges
            .iter()
            .filter_map(|(source, target)| {
                Some((
                    *index_by_id.get(source.as_str())?,
                    *index_by_id.get(target.as_str())?,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, GraphSnapshot, Node};

    #[test]
    fn kind_names_round_trip_through_from_str() {
        for name in LayoutKind::NAMES {
            let kind = name.parse::<LayoutKind>().expect("known kind");
            assert_eq!(kind.name(), name);
        }
        assert!("force-atlas".parse::<LayoutKind>().is_err());
    }

    #[test]
    fn kinds_deserialize_with_partial_config() {
        let kind: LayoutKind =
            serde_json::from_str(r#"{"name": "hierarchical-tree", "root": "n1"}"#).expect("kind");
        assert_eq!(
            kind,
            LayoutKind::HierarchicalTree(HierarchyConfig {
                root: Some("n1".to_owned()),
                min_level_height: 120.0,
            })
        );
    }

    #[test]
    fn job_only_contains_visible_nodes_and_edges() {
        let mut graph = GraphIndex::from_snapshot(GraphSnapshot {
            nodes: vec![
                Node::new("a", "Host", ""),
                Node::new("b", "Host", ""),
                Node::new("c", "Host", ""),
            ],
            edges: vec![Edge::new("e1", "a", "b", "L"), Edge::new("e2", "b", "c", "L")],
        });
        graph.set_node_hidden("c", true);

        let job = LayoutJob::from_visible(&graph, LayoutKind::default(), Viewport::default());

        let ids = job.nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(job.edges, vec![("a".to_owned(), "b".to_owned())]);
        assert_eq!(job.indexed_edges(), vec![(0, 1)]);
    }
}
