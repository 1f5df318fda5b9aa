use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Value, json};

use crate::graph::{Edge, META_EDGE_KIND, NodeId};

#[derive(Debug, Default)]
struct ExternalTally<'a> {
    count: usize,
    kinds: BTreeSet<&'a str>,
    underlying: Vec<&'a str>,
}

pub fn meta_edge_id(group_id: &str, external_id: &str) -> String {
    format!("meta:{group_id}:{external_id}")
}

/// Folds the edges touching a group into one meta-edge per external neighbour.
///
/// Edges with both endpoints inside `member_ids` are internal and produce nothing.
/// `resolve` maps an external node to the node the meta-edge should point at, or
/// `None` to leave that connection out. The result is ordered by resolved target id.
pub fn synthesize<'a, I, F>(
    group_id: &str,
    member_ids: &BTreeSet<NodeId>,
    touching: I,
    resolve: F,
) -> Vec<Edge>
where
    I: IntoIterator<Item = &'a Edge>,
    F: Fn(&str) -> Option<NodeId>,
{
    let mut tallies: BTreeMap<NodeId, ExternalTally<'_>> = BTreeMap::new();

    for edge in touching {
        let source_inside = member_ids.contains(&edge.source);
        let target_inside = member_ids.contains(&edge.target);
        let external = match (source_inside, target_inside) {
            (true, false) => edge.target.as_str(),
            (false, true) => edge.source.as_str(),
            _ => continue,
        };
        let Some(target) = resolve(external) else {
            continue;
        };

        let tally = tallies.entry(target).or_default();
        tally.count += 1;
        tally.kinds.insert(edge.kind.as_str());
        tally.underlying.push(edge.id.as_str());
    }

    tallies
        .into_iter()
        .map(|(external, tally)| {
            let label = match (tally.count, tally.kinds.first()) {
                (1, Some(kind)) => (*kind).to_owned(),
                (count, _) => format!("{count} connections"),
            };

            let mut edge = Edge::new(
                meta_edge_id(group_id, &external),
                group_id,
                external,
                META_EDGE_KIND,
            );
            edge.label = label;
            edge.properties.insert("count".to_owned(), json!(tally.count));
            edge.properties.insert(
                "types".to_owned(),
                Value::from(tally.kinds.into_iter().collect::<Vec<_>>()),
            );
            edge.properties.insert(
                "underlying".to_owned(),
                Value::from(tally.underlying),
            );
            edge
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn members(ids: &[&str]) -> BTreeSet<NodeId> {
        ids.iter().map(|id| (*id).to_owned()).collect()
    }

    fn as_is(external: &str) -> Option<NodeId> {
        Some(external.to_owned())
    }

    #[test]
    fn one_meta_edge_per_external_neighbour() {
        let edges = [
            Edge::new("e1", "n1", "n3", "CONNECTS_TO"),
            Edge::new("e2", "n2", "n3", "CONNECTS_TO"),
            Edge::new("e3", "n1", "n4", "OWNED_BY"),
            Edge::new("e4", "n1", "n2", "PEER"),
        ];

        let meta = synthesize("group:1", &members(&["n1", "n2"]), &edges, as_is);

        assert_eq!(meta.len(), 2);
        assert_eq!(meta[0].id, "meta:group:1:n3");
        assert_eq!(meta[0].source, "group:1");
        assert_eq!(meta[0].target, "n3");
        assert_eq!(meta[0].label, "2 connections");
        assert_eq!(meta[0].properties["count"], 2);
        assert_eq!(meta[1].id, "meta:group:1:n4");
        assert_eq!(meta[1].label, "OWNED_BY");
        assert!(meta.iter().all(Edge::is_meta));
    }

    #[test]
    fn incoming_edges_count_toward_the_same_neighbour() {
        let edges = [
            Edge::new("e1", "n9", "n1", "LOGS_IN"),
            Edge::new("e2", "n2", "n9", "ALERTS"),
        ];

        let meta = synthesize("g", &members(&["n1", "n2"]), &edges, as_is);

        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].target, "n9");
        assert_eq!(meta[0].label, "2 connections");
        assert_eq!(meta[0].properties["types"], json!(["ALERTS", "LOGS_IN"]));
    }

    #[test]
    fn internal_only_group_has_no_meta_edges() {
        let edges = [
            Edge::new("e1", "n1", "n2", "PEER"),
            Edge::new("e2", "n1", "n1", "SELF"),
        ];
        assert!(synthesize("g", &members(&["n1", "n2"]), &edges, as_is).is_empty());
    }

    #[test]
    fn resolved_neighbours_merge_and_dropped_ones_vanish() {
        let edges = [
            Edge::new("e1", "n1", "n3", "CONNECTS_TO"),
            Edge::new("e2", "n2", "n4", "OWNED_BY"),
            Edge::new("e3", "n1", "n5", "LOGS_IN"),
        ];
        let held_by_other = |external: &str| match external {
            "n3" | "n4" => Some("group:7".to_owned()),
            "n5" => None,
            other => Some(other.to_owned()),
        };

        let meta = synthesize("group:1", &members(&["n1", "n2"]), &edges, held_by_other);

        assert_eq!(meta.len(), 1);
        assert_eq!(meta[0].id, "meta:group:1:group:7");
        assert_eq!(meta[0].target, "group:7");
        assert_eq!(meta[0].label, "2 connections");
        assert_eq!(meta[0].properties["underlying"], json!(["e1", "e2"]));
    }

    proptest! {
        #[test]
        fn meta_edge_count_matches_distinct_external_neighbours(
            pairs in prop::collection::vec((0usize..10, 0usize..10), 0..50),
            picked in prop::collection::btree_set(0usize..10, 2..6),
        ) {
            let member_ids = picked.iter().map(|i| format!("n{i}")).collect::<BTreeSet<_>>();
            let edges = pairs
                .iter()
                .enumerate()
                .map(|(i, (s, t))| Edge::new(format!("e{i}"), format!("n{s}"), format!("n{t}"), "LINK"))
                .collect::<Vec<_>>();

            let expected = edges
                .iter()
                .filter_map(|e| match (member_ids.contains(&e.source), member_ids.contains(&e.target)) {
                    (true, false) => Some(e.target.clone()),
                    (false, true) => Some(e.source.clone()),
                    _ => None,
                })
                .collect::<BTreeSet<_>>();

            let meta = synthesize("g", &member_ids, &edges, as_is);
            prop_assert_eq!(meta.len(), expected.len());
            let targets = meta.iter().map(|e| e.target.clone()).collect::<BTreeSet<_>>();
            prop_assert_eq!(targets, expected);
        }
    }
}
