//! The authoritative table of groups and the collapse/expand transitions.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{GroupError, RestoreSkip};
use crate::graph::{Edge, EdgeId, GROUP_NODE_KIND, GraphIndex, InsertEdgeError, Node, NodeId};
use crate::visibility;

pub mod archive;
pub mod meta;

pub type GroupId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    Auto,
    Manual,
}

impl GroupKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub members: BTreeSet<NodeId>,
    pub expanded: bool,
    pub archived: Vec<Edge>,
    pub meta_edges: Vec<Edge>,
    pub kind: GroupKind,
    pub source_type: Option<String>,
    seq: u64,
}

/// What a group-management panel shows per group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSnapshot {
    pub id: GroupId,
    pub name: String,
    pub members: Vec<NodeId>,
    pub expanded: bool,
    pub kind: GroupKind,
    pub source_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Edges another group currently keeps out of the graph; that group re-adds them.
    pub deferred: Vec<EdgeId>,
    pub skipped: Vec<RestoreSkip>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeToggle {
    Created(GroupId),
    Deleted(GroupId, RestoreReport),
}

#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: HashMap<GroupId, Group>,
    member_of: HashMap<NodeId, GroupId>,
    next_seq: u64,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn group_of(&self, node_id: &str) -> Option<&Group> {
        self.member_of
            .get(node_id)
            .and_then(|group_id| self.groups.get(group_id))
    }

    pub fn collapsed(&self) -> impl Iterator<Item = &Group> {
        self.groups.values().filter(|group| !group.expanded)
    }

    pub fn find_auto_group(&self, source_type: &str) -> Option<&Group> {
        self.groups.values().find(|group| {
            group.kind == GroupKind::Auto && group.source_type.as_deref() == Some(source_type)
        })
    }

    /// Groups in creation order.
    pub fn snapshots(&self) -> Vec<GroupSnapshot> {
        self.ordered()
            .into_iter()
            .map(|group| GroupSnapshot {
                id: group.id.clone(),
                name: group.name.clone(),
                members: group.members.iter().cloned().collect(),
                expanded: group.expanded,
                kind: group.kind,
                source_type: group.source_type.clone(),
            })
            .collect()
    }

    /// Forgets every group without touching the graph; used when a new dataset replaces it.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.member_of.clear();
    }

    pub fn create_group<I>(
        &mut self,
        graph: &mut GraphIndex,
        member_ids: I,
        name: &str,
        kind: GroupKind,
        source_type: Option<String>,
    ) -> Result<GroupId, GroupError>
    where
        I: IntoIterator<Item = NodeId>,
    {
        if !graph.is_ready() {
            return Err(GroupError::NotReady);
        }

        let members = member_ids.into_iter().collect::<BTreeSet<_>>();
        if members.len() < 2 {
            return Err(GroupError::InsufficientMembers(members.len()));
        }
        for member in &members {
            match graph.node(member) {
                Some(node) if !node.is_group() => {}
                _ => return Err(GroupError::UnknownNode(member.clone())),
            }
            if let Some(group) = self.member_of.get(member) {
                return Err(GroupError::AlreadyGrouped {
                    node: member.clone(),
                    group: group.clone(),
                });
            }
        }

        let (id, seq) = self.allocate_id(graph);
        // Originals a collapsed neighbour keeps out of the graph still belong to this group too.
        let held = self
            .ordered()
            .into_iter()
            .flat_map(|group| group.archived.iter());
        let archived = archive::capture(graph, &members, held);

        for edge in &archived {
            graph.remove_edge(&edge.id);
        }

        let mut group_node = Node::new(id.clone(), GROUP_NODE_KIND, name);
        group_node
            .properties
            .insert("memberCount".to_owned(), json!(members.len()));
        group_node
            .properties
            .insert("groupKind".to_owned(), json!(kind.label()));
        if let Some(source_type) = &source_type {
            group_node
                .properties
                .insert("sourceType".to_owned(), json!(source_type));
        }
        graph.insert_node(group_node);
        visibility::hide(graph, &members);

        info!(
            group = %id,
            name,
            kind = kind.label(),
            members = members.len(),
            archived = archived.len(),
            "group created"
        );

        for member in &members {
            self.member_of.insert(member.clone(), id.clone());
        }
        self.groups.insert(
            id.clone(),
            Group {
                id: id.clone(),
                name: name.to_owned(),
                members,
                expanded: false,
                archived,
                meta_edges: Vec::new(),
                kind,
                source_type,
                seq,
            },
        );
        self.refresh_meta_edges(graph);

        Ok(id)
    }

    /// Restores the group's original topology, then drops the record.
    pub fn delete_group(
        &mut self,
        graph: &mut GraphIndex,
        group_id: &str,
    ) -> Result<RestoreReport, GroupError> {
        if !graph.is_ready() {
            return Err(GroupError::NotReady);
        }
        let group = self
            .groups
            .get(group_id)
            .ok_or_else(|| GroupError::UnknownGroup(group_id.to_owned()))?;

        let report = if group.expanded {
            RestoreReport::default()
        } else {
            for edge in &group.meta_edges {
                graph.remove_edge(&edge.id);
            }
            self.restore_edges(graph, group_id, &group.archived)
        };
        visibility::show(graph, &group.members);
        graph.remove_node(group_id);

        info!(
            group = %group_id,
            restored = report.restored,
            deferred = report.deferred.len(),
            skipped = report.skipped.len(),
            "group deleted"
        );

        if let Some(group) = self.groups.remove(group_id) {
            for member in &group.members {
                self.member_of.remove(member);
            }
        }
        self.refresh_meta_edges(graph);
        Ok(report)
    }

    /// Swaps between the collapsed and expanded states, returning the new `expanded` flag.
    pub fn toggle_expansion(
        &mut self,
        graph: &mut GraphIndex,
        group_id: &str,
    ) -> Result<bool, GroupError> {
        if !graph.is_ready() {
            return Err(GroupError::NotReady);
        }
        let group = self
            .groups
            .get(group_id)
            .ok_or_else(|| GroupError::UnknownGroup(group_id.to_owned()))?;

        let expanded = if group.expanded {
            for edge in &group.archived {
                graph.remove_edge(&edge.id);
            }
            visibility::hide(graph, &group.members);
            graph.set_node_hidden(group_id, false);
            debug!(group = %group_id, "group collapsed");
            false
        } else {
            let report = self.restore_edges(graph, group_id, &group.archived);
            visibility::show(graph, &group.members);
            graph.set_node_hidden(group_id, true);
            debug!(
                group = %group_id,
                restored = report.restored,
                deferred = report.deferred.len(),
                "group expanded"
            );
            true
        };

        if let Some(group) = self.groups.get_mut(group_id) {
            group.expanded = expanded;
        }
        self.refresh_meta_edges(graph);
        info!(group = %group_id, expanded, "group expansion toggled");
        Ok(expanded)
    }

    /// Deletes the auto group for `source_type` if there is one, otherwise groups
    /// every ungrouped node of that type.
    pub fn toggle_by_type(
        &mut self,
        graph: &mut GraphIndex,
        source_type: &str,
    ) -> Result<TypeToggle, GroupError> {
        if !graph.is_ready() {
            return Err(GroupError::NotReady);
        }

        if let Some(existing) = self.find_auto_group(source_type) {
            let group_id = existing.id.clone();
            let report = self.delete_group(graph, &group_id)?;
            return Ok(TypeToggle::Deleted(group_id, report));
        }

        let mut candidates = graph
            .nodes_of_kind(source_type)
            .filter(|node| !node.is_group() && !self.member_of.contains_key(&node.id))
            .map(|node| node.id.clone())
            .collect::<Vec<_>>();
        candidates.sort();

        let group_id = self.create_group(
            graph,
            candidates,
            &format!("{source_type} group"),
            GroupKind::Auto,
            Some(source_type.to_owned()),
        )?;
        Ok(TypeToggle::Created(group_id))
    }

    /// Deletes every group, newest first.
    pub fn reset(&mut self, graph: &mut GraphIndex) -> Vec<(GroupId, RestoreReport)> {
        let mut ordered = self
            .ordered()
            .into_iter()
            .map(|group| group.id.clone())
            .collect::<Vec<_>>();
        ordered.reverse();

        let mut reports = Vec::with_capacity(ordered.len());
        for group_id in ordered {
            match self.delete_group(graph, &group_id) {
                Ok(report) => reports.push((group_id, report)),
                Err(error) => warn!(group = %group_id, %error, "group reset failed"),
            }
        }
        reports
    }

    fn ordered(&self) -> Vec<&Group> {
        let mut ordered = self.groups.values().collect::<Vec<_>>();
        ordered.sort_by_key(|group| group.seq);
        ordered
    }

    fn allocate_id(&mut self, graph: &GraphIndex) -> (GroupId, u64) {
        loop {
            self.next_seq += 1;
            let id = format!("group:{}", self.next_seq);
            if !graph.contains_node(&id) && !self.groups.contains_key(&id) {
                return (id, self.next_seq);
            }
        }
    }

    /// The collapsed group, other than `except`, that keeps `edge` out of the graph.
    fn holder(&self, edge: &Edge, except: &str) -> Option<&Group> {
        [&edge.source, &edge.target]
            .into_iter()
            .filter_map(|node_id| self.group_of(node_id))
            .find(|group| group.id != except && !group.expanded)
    }

    /// Where a meta-edge of `group` toward `external` lands: the node itself, or the
    /// node of the collapsed group holding it. A link between two collapsed groups is
    /// drawn once, from the older group.
    fn resolve_external(&self, group: &Group, external: &str) -> Option<NodeId> {
        match self.group_of(external) {
            Some(owner) if owner.id == group.id => None,
            Some(owner) if !owner.expanded => (owner.seq > group.seq).then(|| owner.id.clone()),
            _ => Some(external.to_owned()),
        }
    }

    /// Re-derives the meta-edges of every group from the current collapse state.
    fn refresh_meta_edges(&mut self, graph: &mut GraphIndex) {
        let planned = self
            .ordered()
            .into_iter()
            .map(|group| {
                let edges = if group.expanded {
                    Vec::new()
                } else {
                    meta::synthesize(&group.id, &group.members, &group.archived, |external| {
                        self.resolve_external(group, external)
                    })
                };
                (group.id.clone(), edges)
            })
            .collect::<Vec<_>>();

        for group in self.groups.values() {
            for edge in &group.meta_edges {
                graph.remove_edge(&edge.id);
            }
        }

        let mut total = 0usize;
        for (group_id, edges) in planned {
            let mut inserted = Vec::with_capacity(edges.len());
            for edge in edges {
                match graph.insert_edge(edge.clone()) {
                    Ok(()) => inserted.push(edge),
                    Err(error) => {
                        warn!(group = %group_id, edge = %edge.id, ?error, "meta-edge could not be added");
                    }
                }
            }
            total += inserted.len();
            if let Some(group) = self.groups.get_mut(&group_id) {
                group.meta_edges = inserted;
            }
        }
        debug!(meta_edges = total, "meta-edges refreshed");
    }

    /// Best-effort: every edge is attempted even after earlier ones fail.
    fn restore_edges(&self, graph: &mut GraphIndex, group_id: &str, edges: &[Edge]) -> RestoreReport {
        let mut report = RestoreReport::default();
        for edge in edges {
            if let Some(holder) = self.holder(edge, group_id) {
                debug!(group = %group_id, edge = %edge.id, holder = %holder.id, "edge held by another group");
                report.deferred.push(edge.id.clone());
                continue;
            }

            match graph.insert_edge(edge.clone()) {
                Ok(()) => {
                    graph.set_edge_hidden(&edge.id, false);
                    report.restored += 1;
                }
                Err(InsertEdgeError::Duplicate) => {
                    warn!(group = %group_id, edge = %edge.id, "skipping edge already present");
                    report.skipped.push(RestoreSkip::DuplicateEdge(edge.id.clone()));
                }
                Err(InsertEdgeError::DanglingEndpoint(node)) => {
                    warn!(group = %group_id, edge = %edge.id, %node, "skipping edge with missing endpoint");
                    report.skipped.push(RestoreSkip::DanglingEdgeReference {
                        edge: edge.id.clone(),
                        node,
                    });
                }
            }
        }
        report
    }
}
