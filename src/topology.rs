//! The facade a host drives: one graph, one group table, one layout slot.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use tracing::{info, warn};

use crate::config::Settings;
use crate::error::GroupError;
use crate::events::GraphEvent;
use crate::graph::{GraphIndex, GraphSnapshot, NodeId};
use crate::groups::{Group, GroupId, GroupKind, GroupRegistry, GroupSnapshot, RestoreReport, TypeToggle};
use crate::layout::builtin::BuiltinProvider;
use crate::layout::orchestrator::{LayoutCompletion, LayoutOrchestrator, LayoutRequest, RunStatus};
use crate::layout::{LayoutKind, LayoutProvider};
use crate::select::matching_nodes;

pub struct Topology {
    graph: GraphIndex,
    groups: GroupRegistry,
    layout: LayoutOrchestrator,
    selection: Vec<NodeId>,
    events: Vec<GraphEvent>,
}

impl Topology {
    pub fn new(provider: Box<dyn LayoutProvider>, settings: &Settings) -> Self {
        Self {
            graph: GraphIndex::new(),
            groups: GroupRegistry::new(),
            layout: LayoutOrchestrator::new(
                provider,
                settings.viewport,
                settings.layout.timeout(),
                settings.layout.fallback.clone(),
            ),
            selection: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_builtin_provider(settings: &Settings) -> Self {
        Self::new(Box::new(BuiltinProvider), settings)
    }

    /// Replaces the dataset. Groups, selection and any pending layout are discarded.
    pub fn load(&mut self, snapshot: GraphSnapshot) {
        self.layout.reset();
        self.groups.clear();
        self.selection.clear();
        self.graph = GraphIndex::from_snapshot(snapshot);
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "dataset loaded"
        );
    }

    pub fn graph(&self) -> &GraphIndex {
        &self.graph
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.group(group_id)
    }

    pub fn groups(&self) -> Vec<GroupSnapshot> {
        self.groups.snapshots()
    }

    pub fn selection(&self) -> &[NodeId] {
        &self.selection
    }

    pub fn set_selection<I>(&mut self, node_ids: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        self.selection = node_ids
            .into_iter()
            .filter(|id| self.graph.contains_node(id))
            .collect();
        self.selection.sort();
        self.selection.dedup();
    }

    /// Replaces the selection with every fuzzy match for `query`; returns the match count.
    pub fn select_matching(&mut self, query: &str) -> usize {
        self.selection = matching_nodes(&self.graph, query);
        self.selection.len()
    }

    pub fn create_group<I>(
        &mut self,
        member_ids: I,
        name: &str,
        kind: GroupKind,
        source_type: Option<String>,
    ) -> Result<GroupId, GroupError>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let group_id =
            self.groups
                .create_group(&mut self.graph, member_ids, name, kind, source_type)?;
        self.push_created(&group_id);
        Ok(group_id)
    }

    /// Groups the current selection as a manual group and clears the selection.
    pub fn group_selected(&mut self, name: &str) -> Result<GroupId, GroupError> {
        let members = self.selection.clone();
        let group_id = self.create_group(members, name, GroupKind::Manual, None)?;
        self.selection.clear();
        Ok(group_id)
    }

    pub fn delete_group(&mut self, group_id: &str) -> Result<RestoreReport, GroupError> {
        let report = self.groups.delete_group(&mut self.graph, group_id)?;
        self.push_deleted(group_id, &report);
        Ok(report)
    }

    /// Re-running a layout afterwards is left to the caller.
    pub fn toggle_expansion(&mut self, group_id: &str) -> Result<bool, GroupError> {
        let expanded = self.groups.toggle_expansion(&mut self.graph, group_id)?;
        self.events.push(GraphEvent::ExpansionToggled {
            group_id: group_id.to_owned(),
            expanded,
        });
        Ok(expanded)
    }

    pub fn toggle_by_type(&mut self, source_type: &str) -> Result<TypeToggle, GroupError> {
        let outcome = self.groups.toggle_by_type(&mut self.graph, source_type)?;
        match &outcome {
            TypeToggle::Created(group_id) => self.push_created(group_id),
            TypeToggle::Deleted(group_id, report) => self.push_deleted(group_id, report),
        }
        Ok(outcome)
    }

    /// Deletes every group; returns how many were removed.
    pub fn reset_groups(&mut self) -> usize {
        let reports = self.groups.reset(&mut self.graph);
        for (group_id, report) in &reports {
            self.push_deleted(group_id, report);
        }
        reports.len()
    }

    pub fn layout_running(&self) -> bool {
        self.layout.is_running()
    }

    pub fn run_layout(&mut self, kind: LayoutKind) -> RunStatus {
        let request = LayoutRequest {
            kind,
            selection: self.selection.clone(),
        };
        let status = self.layout.run(&mut self.graph, &self.groups, request);
        if let RunStatus::Completed(completion) = &status {
            self.push_completion(completion.clone());
        }
        status
    }

    /// Non-blocking; returns how many runs finished during this call.
    pub fn poll_layout(&mut self) -> usize {
        let mut finished = 0usize;
        while let Some(completion) = self.layout.poll(&mut self.graph, &self.groups) {
            self.push_completion(completion);
            finished += 1;
        }
        finished
    }

    pub fn wait_for_layout(&mut self) -> usize {
        let completions = self.layout.wait(&mut self.graph, &self.groups);
        let finished = completions.len();
        for completion in completions {
            self.push_completion(completion);
        }
        finished
    }

    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    fn push_created(&mut self, group_id: &str) {
        if let Some(group) = self.groups.group(group_id) {
            self.events.push(GraphEvent::GroupCreated {
                group_id: group.id.clone(),
                name: group.name.clone(),
                members: group.members.len(),
            });
        }
    }

    fn push_deleted(&mut self, group_id: &str, report: &RestoreReport) {
        self.events.push(GraphEvent::GroupDeleted {
            group_id: group_id.to_owned(),
            restored: report.restored,
            skipped: report.skipped.len(),
        });
    }

    fn push_completion(&mut self, completion: LayoutCompletion) {
        let event = match completion.result {
            Ok(positions) => GraphEvent::LayoutCompleted {
                kind: completion.kind,
                positions: positions.into_iter().collect::<BTreeMap<_, _>>(),
            },
            Err(error) => GraphEvent::LayoutFailed {
                kind: completion.kind,
                reason: error.to_string(),
            },
        };
        self.events.push(event);
    }
}

/// Shares one `Topology` between threads; group toggles never wait for each other.
#[derive(Clone)]
pub struct SharedTopology {
    inner: Arc<Mutex<Topology>>,
}

impl SharedTopology {
    pub fn new(topology: Topology) -> Self {
        Self {
            inner: Arc::new(Mutex::new(topology)),
        }
    }

    /// Runs `f` with exclusive access, waiting for any other holder.
    pub fn with<R>(&self, f: impl FnOnce(&mut Topology) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Rejects with `Busy` instead of queueing when another operation holds the topology.
    pub fn try_toggle_by_type(&self, source_type: &str) -> Result<TypeToggle, GroupError> {
        match self.inner.try_lock() {
            Ok(mut guard) => guard.toggle_by_type(source_type),
            Err(TryLockError::WouldBlock) => {
                warn!(source_type, "type toggle rejected, another operation is in flight");
                Err(GroupError::Busy)
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().toggle_by_type(source_type),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Topology> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
