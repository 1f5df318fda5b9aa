use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::graph::{GraphIndex, NodeId};

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// Visible, groupable nodes whose label or id matches `query`, best match first.
pub fn matching_nodes(graph: &GraphIndex, query: &str) -> Vec<NodeId> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut scored = graph
        .nodes()
        .filter(|node| !node.hidden && !node.is_group())
        .filter_map(|node| {
            let by_label = fuzzy_match_score(&matcher, &node.label, query);
            let by_id = fuzzy_match_score(&matcher, &node.id, query);
            by_label.max(by_id).map(|score| (score, node.id.clone()))
        })
        .collect::<Vec<_>>();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    scored.into_iter().map(|(_score, id)| id).collect()
}
