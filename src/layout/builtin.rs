//! In-process provider for the kinds that do not need an external engine.

use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::thread;

use tracing::debug;

use super::force::force_layout;
use super::{
    CircleConfig, ConcentricConfig, ForceConfig, GridConfig, LayoutCallback, LayoutJob,
    LayoutKind, LayoutOutcome, LayoutProvider, Positions,
};
use crate::error::LayoutError;
use crate::graph::{Position, pos};
use crate::util::grid_columns;

/// Runs each job on its own worker thread. `elk` and `klay` need a layered engine
/// and are reported as unsupported.
#[derive(Debug, Default)]
pub struct BuiltinProvider;

impl LayoutProvider for BuiltinProvider {
    fn run(&mut self, job: LayoutJob, on_complete: LayoutCallback) {
        thread::spawn(move || {
            let outcome = execute(&job);
            debug!(kind = job.kind.name(), ok = outcome.is_ok(), "builtin layout finished");
            on_complete(outcome);
        });
    }
}

pub fn execute(job: &LayoutJob) -> LayoutOutcome {
    match &job.kind {
        LayoutKind::Grid(config) => Ok(grid(job, config)),
        LayoutKind::Circle(config) => Ok(circle(job, config)),
        LayoutKind::Concentric(config) => Ok(concentric(job, config)),
        LayoutKind::Cose(config)
        | LayoutKind::Fcose(config)
        | LayoutKind::Cise(config)
        | LayoutKind::Cola(config)
        | LayoutKind::Spread(config) => Ok(force(job, config)),
        kind @ (LayoutKind::Elk(_) | LayoutKind::Klay(_) | LayoutKind::HierarchicalTree(_)) => {
            Err(LayoutError::Unsupported(kind.name()))
        }
    }
}

fn center(job: &LayoutJob) -> Position {
    pos(job.viewport.width / 2.0, job.viewport.height / 2.0)
}

fn grid(job: &LayoutJob, config: &GridConfig) -> Positions {
    let total = job.nodes.len();
    let columns = config.columns.unwrap_or_else(|| grid_columns(total)).max(1);
    let rows = total.div_ceil(columns).max(1);
    let origin = center(job)
        - pos(
            (columns - 1) as f32 * config.spacing / 2.0,
            (rows - 1) as f32 * config.spacing / 2.0,
        );

    job.nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let offset = pos(
                (index % columns) as f32 * config.spacing,
                (index / columns) as f32 * config.spacing,
            );
            (node.id.clone(), origin + offset)
        })
        .collect()
}

fn ring(ids: &[&str], middle: Position, radius: f32, positions: &mut Positions) {
    if ids.len() == 1 && radius == 0.0 {
        positions.insert(ids[0].to_owned(), middle);
        return;
    }
    for (index, id) in ids.iter().enumerate() {
        let angle = index as f32 / ids.len() as f32 * TAU;
        positions.insert((*id).to_owned(), middle + pos(angle.cos(), angle.sin()) * radius);
    }
}

fn circle(job: &LayoutJob, config: &CircleConfig) -> Positions {
    let ids = job.nodes.iter().map(|node| node.id.as_str()).collect::<Vec<_>>();
    let radius = if ids.len() <= 1 {
        0.0
    } else {
        config
            .radius
            .unwrap_or(config.min_spacing * ids.len() as f32 / TAU)
    };

    let mut positions = Positions::with_capacity(ids.len());
    ring(&ids, center(job), radius, &mut positions);
    positions
}

/// Rings by degree, busiest nodes in the middle.
fn concentric(job: &LayoutJob, config: &ConcentricConfig) -> Positions {
    let mut degree = BTreeMap::<&str, usize>::new();
    for node in &job.nodes {
        degree.insert(node.id.as_str(), 0);
    }
    for (source, target) in &job.edges {
        for endpoint in [source, target] {
            if let Some(count) = degree.get_mut(endpoint.as_str()) {
                *count += 1;
            }
        }
    }

    let mut rings = BTreeMap::<std::cmp::Reverse<usize>, Vec<&str>>::new();
    for (id, count) in degree {
        rings.entry(std::cmp::Reverse(count)).or_default().push(id);
    }

    let middle = center(job);
    let mut positions = Positions::with_capacity(job.nodes.len());
    for (index, ids) in rings.values().enumerate() {
        let radius = if index == 0 && ids.len() > 1 {
            config.ring_spacing / 2.0
        } else {
            index as f32 * config.ring_spacing
        };
        ring(ids, middle, radius, &mut positions);
    }
    positions
}

fn force(job: &LayoutJob, config: &ForceConfig) -> Positions {
    let ids = job.nodes.iter().map(|node| node.id.clone()).collect::<Vec<_>>();
    let placed = force_layout(&ids, &job.indexed_edges(), config.iterations);
    let middle = center(job);

    ids.into_iter()
        .zip(placed)
        .map(|(id, position)| (id, middle + position))
        .collect()
}
