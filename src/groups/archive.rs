use std::collections::{BTreeSet, HashSet};

use crate::graph::{Edge, GraphIndex, NodeId};

/// Snapshots every original edge touching a member, each edge once even when both
/// ends are members.
///
/// Live edges come from the graph; meta-edges there are derived and skipped. `held`
/// supplies originals that other groups currently keep out of the graph.
pub fn capture<'a, I>(graph: &GraphIndex, member_ids: &BTreeSet<NodeId>, held: I) -> Vec<Edge>
where
    I: IntoIterator<Item = &'a Edge>,
{
    if !graph.is_ready() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut archived = Vec::new();
    for member in member_ids {
        for edge in graph.incident_edges(member) {
            if !edge.is_meta() && seen.insert(edge.id.clone()) {
                archived.push(edge.clone());
            }
        }
    }
    for edge in held {
        let touches_member = member_ids.iter().any(|member| edge.touches(member));
        if touches_member && seen.insert(edge.id.clone()) {
            archived.push(edge.clone());
        }
    }
    archived
}
