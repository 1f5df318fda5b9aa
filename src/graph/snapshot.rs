use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;

use super::{Edge, Node};

/// The `{ nodes, edges }` document handed over by the data-fetch collaborator.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

pub fn load_snapshot(path: &Path) -> Result<GraphSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph snapshot {}", path.display()))?;
    parse_snapshot(&raw).with_context(|| format!("failed to parse graph snapshot {}", path.display()))
}

/// Accepts either the bare document or one wrapped in a `data` envelope.
pub fn parse_snapshot(raw: &str) -> Result<GraphSnapshot> {
    let parsed: Value = serde_json::from_str(raw).context("invalid JSON in graph snapshot")?;
    let object = parsed
        .as_object()
        .ok_or_else(|| anyhow!("graph snapshot must be a JSON object"))?;

    let document = match object.get("data") {
        Some(inner) if !object.contains_key("nodes") => inner,
        _ => &parsed,
    };

    let snapshot =
        GraphSnapshot::deserialize(document).context("graph snapshot has an unexpected shape")?;

    if snapshot.nodes.is_empty() && !snapshot.edges.is_empty() {
        return Err(anyhow!(
            "graph snapshot lists {} edges but no nodes",
            snapshot.edges.len()
        ));
    }

    Ok(snapshot)
}
