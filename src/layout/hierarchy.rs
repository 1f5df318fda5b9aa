use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use super::{LayoutJob, Positions};
use crate::error::LayoutError;
use crate::graph::{NodeId, pos};

#[derive(Clone, Debug, PartialEq)]
pub struct HierarchyLayout {
    pub root: NodeId,
    /// BFS hop distance from the root; unreachable nodes have no entry.
    pub levels: HashMap<NodeId, usize>,
    /// Nodes placed in the row below the deepest level, ordered by id.
    pub overflow: Vec<NodeId>,
    pub level_height: f32,
    pub positions: Positions,
}

/// Picks the traversal origin: explicit root, then a single selected node, then the
/// highest-degree node (lowest id wins ties). Group nodes are never eligible.
pub fn select_root(
    job: &LayoutJob,
    explicit: Option<&str>,
    selection: &[NodeId],
) -> Result<NodeId, LayoutError> {
    let eligible = |id: &str| job.nodes.iter().any(|node| node.id == id && !node.is_group);

    if let Some(root) = explicit
        && eligible(root)
    {
        return Ok(root.to_owned());
    }

    if let [selected] = selection
        && eligible(selected.as_str())
    {
        return Ok(selected.clone());
    }

    let mut degree = HashMap::<&str, usize>::new();
    for (source, target) in &job.edges {
        *degree.entry(source.as_str()).or_default() += 1;
        if source != target {
            *degree.entry(target.as_str()).or_default() += 1;
        }
    }

    job.nodes
        .iter()
        .filter(|node| !node.is_group)
        .map(|node| (degree.get(node.id.as_str()).copied().unwrap_or(0), &node.id))
        .min_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_degree, id)| id.clone())
        .ok_or(LayoutError::RootNotFound)
}

pub fn compute_layout(
    job: &LayoutJob,
    root: &str,
    min_level_height: f32,
) -> Result<HierarchyLayout, LayoutError> {
    let groups = job
        .nodes
        .iter()
        .filter(|node| node.is_group)
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();
    let known = job
        .nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();
    if !known.contains(root) || groups.contains(root) {
        return Err(LayoutError::RootNotFound);
    }

    let mut adjacency = HashMap::<&str, Vec<&str>>::new();
    for (source, target) in &job.edges {
        let (source, target) = (source.as_str(), target.as_str());
        if source == target
            || !known.contains(source)
            || !known.contains(target)
            || groups.contains(source)
            || groups.contains(target)
        {
            continue;
        }
        adjacency.entry(source).or_default().push(target);
        adjacency.entry(target).or_default().push(source);
    }
    for neighbors in adjacency.values_mut() {
        neighbors.sort_unstable();
        neighbors.dedup();
    }

    let mut levels = HashMap::new();
    let mut rows: Vec<Vec<&str>> = Vec::new();
    let mut queue = VecDeque::from([(root, 0usize)]);
    let mut visited = HashSet::from([root]);

    while let Some((node, level)) = queue.pop_front() {
        levels.insert(node.to_owned(), level);
        if rows.len() <= level {
            rows.resize_with(level + 1, Vec::new);
        }
        rows[level].push(node);

        for &next in adjacency.get(node).into_iter().flatten() {
            if visited.insert(next) {
                queue.push_back((next, level + 1));
            }
        }
    }

    let overflow = job
        .nodes
        .iter()
        .filter(|node| !visited.contains(node.id.as_str()))
        .map(|node| node.id.clone())
        .collect::<Vec<_>>();

    let row_count = rows.len() + usize::from(!overflow.is_empty());
    let level_height = (job.viewport.height / row_count as f32).max(min_level_height);
    let width = job.viewport.width;

    let mut positions = Positions::with_capacity(job.nodes.len());
    let mut place_row = |row: &[&str], level: usize| {
        let slots = row.len() as f32 + 1.0;
        for (index, id) in row.iter().enumerate() {
            let x = width * (index as f32 + 1.0) / slots;
            positions.insert((*id).to_owned(), pos(x, level as f32 * level_height));
        }
    };

    for (level, row) in rows.iter().enumerate() {
        place_row(row.as_slice(), level);
    }
    if !overflow.is_empty() {
        let row = overflow.iter().map(String::as_str).collect::<Vec<_>>();
        place_row(row.as_slice(), rows.len());
    }

    debug!(
        root,
        levels = rows.len(),
        overflow = overflow.len(),
        level_height,
        "hierarchical layout computed"
    );

    Ok(HierarchyLayout {
        root: root.to_owned(),
        levels,
        overflow,
        level_height,
        positions,
    })
}
