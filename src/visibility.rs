//! Display-flag toggles. Nothing here deletes data or knows about groups.

use crate::graph::GraphIndex;

/// Hides the given nodes, returning how many actually changed state.
pub fn hide<'a, I>(graph: &mut GraphIndex, node_ids: I) -> usize
where
    I: IntoIterator<Item = &'a String>,
{
    node_ids
        .into_iter()
        .filter(|id| graph.set_node_hidden(id, true))
        .count()
}

pub fn show<'a, I>(graph: &mut GraphIndex, node_ids: I) -> usize
where
    I: IntoIterator<Item = &'a String>,
{
    node_ids
        .into_iter()
        .filter(|id| graph.set_node_hidden(id, false))
        .count()
}

pub fn show_edges<'a, I>(graph: &mut GraphIndex, edge_ids: I) -> usize
where
    I: IntoIterator<Item = &'a String>,
{
    edge_ids
        .into_iter()
        .filter(|id| graph.set_edge_hidden(id, false))
        .count()
}
