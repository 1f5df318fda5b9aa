use std::f32::consts::TAU;

use crate::graph::{NodeId, Position, pos};
use crate::util::stable_pair;

const NODE_RADIUS: f32 = 18.0;

/// Fruchterman-Reingold style simulation seeded on a jittered circle.
///
/// Positions are centered on the origin; the caller translates them into the viewport.
pub(super) fn force_layout(
    node_ids: &[NodeId],
    edges: &[(usize, usize)],
    iterations: usize,
) -> Vec<Position> {
    let n = node_ids.len();
    if n == 0 {
        return Vec::new();
    }

    let base_radius = (n as f32).sqrt() * 180.0;
    let mut positions = node_ids
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let angle = (index as f32 / n as f32) * TAU;
            let (jx, jy) = stable_pair(id);
            let jitter = pos(jx * 80.0, jy * 80.0);
            pos(angle.cos(), angle.sin()) * base_radius + jitter
        })
        .collect::<Vec<_>>();

    if n == 1 {
        return vec![Position::ZERO];
    }

    let area = (base_radius * 2.4).powi(2);
    let k = (area / n as f32).sqrt().max(24.0);
    let min_distance = NODE_RADIUS * 2.0 * 4.2;
    let ideal_length = k + NODE_RADIUS * 2.0 * 3.5;
    let mut temperature = (k * 5.5).max(140.0);

    for _ in 0..iterations {
        let mut disp = vec![Position::ZERO; n];

        for i in 0..n {
            for j in (i + 1)..n {
                let delta = positions[i] - positions[j];
                let distance = delta.length().max(0.5);
                let direction = delta / distance;

                let force = (k * k) / distance;
                disp[i] += direction * force;
                disp[j] -= direction * force;

                if distance < min_distance {
                    let overlap_push = (min_distance - distance) * 2.4;
                    disp[i] += direction * overlap_push;
                    disp[j] -= direction * overlap_push;
                }
            }
        }

        for &(from, to) in edges {
            if from >= n || to >= n || from == to {
                continue;
            }

            let delta = positions[from] - positions[to];
            let distance = delta.length().max(0.5);
            let direction = delta / distance;
            let force = (distance - ideal_length) * 0.18;

            disp[from] -= direction * force;
            disp[to] += direction * force;
        }

        for i in 0..n {
            disp[i] -= positions[i] * 0.0012;
        }

        for i in 0..n {
            let d = disp[i];
            let length = d.length();
            if length > 0.0 {
                positions[i] += d / length * length.min(temperature) * 0.92;
            }
        }

        temperature *= 0.965;
        if temperature < 0.55 {
            break;
        }
    }

    positions
}
