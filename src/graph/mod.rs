//! Id-indexed node and edge storage shared by grouping and layout.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

mod position;
mod snapshot;

pub use position::{Position, pos};
pub use snapshot::{GraphSnapshot, load_snapshot, parse_snapshot};

pub type NodeId = String;
pub type EdgeId = String;

/// Node type tag carried by synthetic group nodes.
pub const GROUP_NODE_KIND: &str = "Group";
/// Edge type tag carried by synthesized meta-edges.
pub const META_EDGE_KIND: &str = "META";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(skip)]
    pub hidden: bool,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: label.into(),
            properties: Map::new(),
            hidden: false,
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == GROUP_NODE_KIND
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(skip)]
    pub hidden: bool,
}

impl Edge {
    pub fn new(
        id: impl Into<EdgeId>,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: kind.into(),
            label: String::new(),
            properties: Map::new(),
            hidden: false,
        }
    }

    pub fn is_meta(&self) -> bool {
        self.kind == META_EDGE_KIND
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Why an edge could not be inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertEdgeError {
    Duplicate,
    DanglingEndpoint(NodeId),
}

#[derive(Clone, Debug, Default)]
pub struct GraphIndex {
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
    incident: HashMap<NodeId, BTreeSet<EdgeId>>,
    positions: HashMap<NodeId, Position>,
    ready: bool,
}

impl GraphIndex {
    /// An index with no dataset loaded; every grouping operation is a no-op on it.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut index = Self {
            ready: true,
            ..Self::default()
        };

        for node in snapshot.nodes {
            if index.nodes.contains_key(&node.id) {
                warn!(node = %node.id, "duplicate node id in snapshot, keeping the first");
                continue;
            }
            index.incident.insert(node.id.clone(), BTreeSet::new());
            index.nodes.insert(node.id.clone(), node);
        }

        let mut dropped = 0usize;
        for edge in snapshot.edges {
            let edge_id = edge.id.clone();
            match index.insert_edge(edge) {
                Ok(()) => {}
                Err(InsertEdgeError::Duplicate) => {
                    warn!(edge = %edge_id, "duplicate edge id in snapshot, keeping the first");
                    dropped += 1;
                }
                Err(InsertEdgeError::DanglingEndpoint(node)) => {
                    warn!(edge = %edge_id, %node, "snapshot edge references a missing node");
                    dropped += 1;
                }
            }
        }

        debug!(
            nodes = index.nodes.len(),
            edges = index.edges.len(),
            dropped,
            "graph index loaded"
        );
        index
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn edge_ids(&self) -> BTreeSet<EdgeId> {
        self.edges.keys().cloned().collect()
    }

    /// Edges with `node_id` as source or target, ordered by edge id.
    pub fn incident_edges<'a>(
        &'a self,
        node_id: &str,
    ) -> impl Iterator<Item = &'a Edge> + use<'a> {
        self.incident
            .get(node_id)
            .into_iter()
            .flatten()
            .filter_map(|edge_id| self.edges.get(edge_id))
    }

    pub fn degree(&self, node_id: &str) -> usize {
        self.incident.get(node_id).map_or(0, BTreeSet::len)
    }

    /// Returns `false` when a node with the same id already exists.
    pub fn insert_node(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        self.incident.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
        true
    }

    /// Removes the node together with every edge still attached to it.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let node = self.nodes.remove(id)?;
        if let Some(edge_ids) = self.incident.remove(id) {
            for edge_id in edge_ids {
                self.remove_edge(&edge_id);
            }
        }
        self.positions.remove(id);
        Some(node)
    }

    pub fn insert_edge(&mut self, edge: Edge) -> Result<(), InsertEdgeError> {
        if self.edges.contains_key(&edge.id) {
            return Err(InsertEdgeError::Duplicate);
        }
        for endpoint in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(InsertEdgeError::DanglingEndpoint(endpoint.clone()));
            }
        }

        for endpoint in [&edge.source, &edge.target] {
            self.incident
                .entry(endpoint.clone())
                .or_default()
                .insert(edge.id.clone());
        }
        self.edges.insert(edge.id.clone(), edge);
        Ok(())
    }

    pub fn remove_edge(&mut self, id: &str) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        for endpoint in [&edge.source, &edge.target] {
            if let Some(edge_ids) = self.incident.get_mut(endpoint) {
                edge_ids.remove(id);
            }
        }
        Some(edge)
    }

    /// Returns whether the flag actually changed.
    pub fn set_node_hidden(&mut self, id: &str, hidden: bool) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) if node.hidden != hidden => {
                node.hidden = hidden;
                true
            }
            _ => false,
        }
    }

    pub fn set_edge_hidden(&mut self, id: &str, hidden: bool) -> bool {
        match self.edges.get_mut(id) {
            Some(edge) if edge.hidden != hidden => {
                edge.hidden = hidden;
                true
            }
            _ => false,
        }
    }

    pub fn is_node_visible(&self, id: &str) -> bool {
        self.nodes.get(id).is_some_and(|node| !node.hidden)
    }

    pub fn visible_node_ids(&self) -> BTreeSet<NodeId> {
        self.nodes
            .values()
            .filter(|node| !node.hidden)
            .map(|node| node.id.clone())
            .collect()
    }

    /// An edge is drawn only when it and both of its endpoints are visible.
    pub fn visible_edge_ids(&self) -> BTreeSet<EdgeId> {
        self.edges
            .values()
            .filter(|edge| {
                !edge.hidden
                    && self.is_node_visible(&edge.source)
                    && self.is_node_visible(&edge.target)
            })
            .map(|edge| edge.id.clone())
            .collect()
    }

    pub fn nodes_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.values().filter(move |node| node.kind == kind)
    }

    pub fn position(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }

    pub fn positions(&self) -> &HashMap<NodeId, Position> {
        &self.positions
    }

    /// Stores positions for nodes that still exist; stale ids are ignored.
    pub fn apply_positions(&mut self, positions: &HashMap<NodeId, Position>) -> usize {
        let known = self.nodes.keys().collect::<HashSet<_>>();
        let mut applied = 0usize;
        for (id, position) in positions {
            if known.contains(id) {
                self.positions.insert(id.clone(), *position);
                applied += 1;
            }
        }
        applied
    }
}
