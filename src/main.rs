use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use topology_lens::graph::{NodeId, load_snapshot};
use topology_lens::{GraphEvent, GroupSnapshot, LayoutKind, Position, Settings, Topology};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Graph snapshot as JSON: `{"nodes": [...], "edges": [...]}`.
    snapshot: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Toggle the auto group for a node type. Repeatable, applied in order.
    #[arg(long = "group-type", value_name = "TYPE")]
    group_types: Vec<String>,
    /// Select every node whose label or id fuzzy-matches QUERY.
    #[arg(long, value_name = "QUERY")]
    select: Option<String>,
    /// Group the current selection under NAME.
    #[arg(long, value_name = "NAME")]
    group_selected: Option<String>,
    #[arg(long = "expand", value_name = "GROUP_ID")]
    expand: Vec<String>,
    #[arg(long)]
    layout: Option<LayoutKind>,
    /// Root node for `hierarchical-tree`.
    #[arg(long)]
    root: Option<NodeId>,
    #[arg(long)]
    width: Option<f32>,
    #[arg(long)]
    height: Option<f32>,
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    groups: Vec<GroupSnapshot>,
    visible_nodes: Vec<NodeId>,
    visible_edges: Vec<String>,
    positions: BTreeMap<NodeId, Position>,
    events: Vec<GraphEvent>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let settings = settings(&args)?;
    let snapshot = load_snapshot(&args.snapshot)?;

    let mut topology = Topology::with_builtin_provider(&settings);
    topology.load(snapshot);

    for source_type in &args.group_types {
        topology
            .toggle_by_type(source_type)
            .with_context(|| format!("failed to toggle group for type {source_type}"))?;
    }

    if let Some(query) = &args.select {
        let matched = topology.select_matching(query);
        info!(query, matched, "selection updated");
    }

    if let Some(name) = &args.group_selected {
        match topology.group_selected(name) {
            Ok(group_id) => info!(group = %group_id, "selection grouped"),
            Err(error) if error.is_user_visible() => bail!("cannot group selection: {error}"),
            Err(error) => warn!(%error, "selection not grouped"),
        }
    }

    for group_id in &args.expand {
        topology
            .toggle_expansion(group_id)
            .with_context(|| format!("failed to expand {group_id}"))?;
    }

    let mut kind = args
        .layout
        .clone()
        .unwrap_or_else(|| settings.layout.default_kind.clone());
    if let (LayoutKind::HierarchicalTree(config), Some(root)) = (&mut kind, &args.root) {
        config.root = Some(root.clone());
    }
    topology.run_layout(kind);
    topology.wait_for_layout();

    let graph = topology.graph();
    let report = Report {
        groups: topology.groups(),
        visible_nodes: graph.visible_node_ids().into_iter().collect(),
        visible_edges: graph.visible_edge_ids().into_iter().collect(),
        positions: graph
            .visible_node_ids()
            .into_iter()
            .filter_map(|id| graph.position(&id).map(|position| (id, position)))
            .collect(),
        events: topology.drain_events(),
    };

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &report).context("failed to write report")?;
    writeln!(stdout)?;
    Ok(())
}

fn settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(width) = args.width {
        settings.viewport.width = width;
    }
    if let Some(height) = args.height {
        settings.viewport.height = height;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.layout.timeout_ms = timeout_ms;
    }
    Ok(settings)
}
