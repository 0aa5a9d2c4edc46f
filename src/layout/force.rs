use crate::config::LayoutConfig;
use crate::error::LayoutError;

use super::backend::{ScopeInput, ScopeSolver, along_extent, cross_extent, orient};
use super::ranking::{compute_ranks, order_rank_nodes, rank_buckets};
use super::types::Point;

const SOLVER: &str = "force";
const ORDER_PASSES: usize = 2;

/// Spring-electrical relaxation (Fruchterman-Reingold) seeded from a layered
/// ordering. Runs a fixed number of iterations without randomness, then
/// snaps every member back onto its rank and resolves overlaps inside each
/// rank so the flow direction stays readable.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForceSolver;

impl ScopeSolver for ForceSolver {
    fn name(&self) -> &'static str {
        SOLVER
    }

    fn place(&self, scope: &ScopeInput, config: &LayoutConfig) -> Result<Vec<Point>, LayoutError> {
        let len = scope.len();
        if len == 0 {
            return Ok(Vec::new());
        }
        let direction = config.direction;
        let cross: Vec<f32> = scope
            .sizes
            .iter()
            .map(|size| cross_extent(*size, direction))
            .collect();
        let along: Vec<f32> = scope
            .sizes
            .iter()
            .map(|size| along_extent(*size, direction))
            .collect();

        let ranks = compute_ranks(len, &scope.edges);
        let mut buckets = rank_buckets(&ranks);
        order_rank_nodes(&mut buckets, &scope.edges, ORDER_PASSES);

        let mut rank_offset = vec![0.0f32; buckets.len()];
        for rank in 1..buckets.len() {
            let prev = buckets[rank - 1]
                .iter()
                .map(|idx| along[*idx])
                .fold(0.0f32, f32::max);
            rank_offset[rank] = rank_offset[rank - 1] + prev + config.layer_spacing;
        }

        // Centers in (cross, along) space.
        let mut centers = vec![(0.0f32, 0.0f32); len];
        for (rank, bucket) in buckets.iter().enumerate() {
            let mut cursor = 0.0f32;
            for idx in bucket {
                centers[*idx] = (cursor + cross[*idx] / 2.0, rank_offset[rank] + along[*idx] / 2.0);
                cursor += cross[*idx] + config.node_spacing;
            }
        }

        relax(&mut centers, &scope.edges, config);

        for (idx, center) in centers.iter().enumerate() {
            if !center.0.is_finite() || !center.1.is_finite() {
                return Err(LayoutError::UnusableGeometry {
                    solver: SOLVER,
                    node: scope.keys[idx].clone(),
                });
            }
        }

        let mut canonical = vec![(0.0f32, 0.0f32); len];
        for (rank, bucket) in buckets.iter_mut().enumerate() {
            bucket.sort_by(|a, b| {
                centers[*a]
                    .0
                    .partial_cmp(&centers[*b].0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(b))
            });
            let mut min_left = f32::NEG_INFINITY;
            for idx in bucket.iter() {
                let left = (centers[*idx].0 - cross[*idx] / 2.0).max(min_left);
                canonical[*idx] = (left, rank_offset[rank]);
                min_left = left + cross[*idx] + config.node_spacing;
            }
        }

        Ok(orient(&canonical, &scope.sizes, direction))
    }
}

fn relax(centers: &mut [(f32, f32)], edges: &[(usize, usize)], config: &LayoutConfig) {
    let len = centers.len();
    if len < 2 {
        return;
    }
    let ideal = (config.layer_spacing * config.force.edge_length_factor).max(1.0);
    let repulsion = config.force.repulsion * ideal * ideal;
    let mut temperature = ideal;
    let mut displacement = vec![(0.0f32, 0.0f32); len];

    for _ in 0..config.force.iterations {
        displacement.iter_mut().for_each(|d| *d = (0.0, 0.0));

        for i in 0..len {
            for j in (i + 1)..len {
                let (dx, dy, dist) = separation(centers[i], centers[j], i, j);
                let force = repulsion / dist;
                let (fx, fy) = (dx / dist * force, dy / dist * force);
                displacement[i].0 += fx;
                displacement[i].1 += fy;
                displacement[j].0 -= fx;
                displacement[j].1 -= fy;
            }
        }

        for &(from, to) in edges {
            if from == to || from >= len || to >= len {
                continue;
            }
            let (dx, dy, dist) = separation(centers[from], centers[to], from, to);
            let force = dist * dist / ideal;
            let (fx, fy) = (dx / dist * force, dy / dist * force);
            displacement[from].0 -= fx;
            displacement[from].1 -= fy;
            displacement[to].0 += fx;
            displacement[to].1 += fy;
        }

        for (center, (dx, dy)) in centers.iter_mut().zip(&displacement) {
            let length = (dx * dx + dy * dy).sqrt();
            if length <= f32::EPSILON {
                continue;
            }
            let step = length.min(temperature);
            center.0 += dx / length * step;
            center.1 += dy / length * step;
        }
        temperature *= config.force.cooling;
    }
}

/// Vector from `b` to `a` and its length. Coincident points get a small
/// index-dependent nudge so they can separate.
fn separation(a: (f32, f32), b: (f32, f32), i: usize, j: usize) -> (f32, f32, f32) {
    let mut dx = a.0 - b.0;
    let mut dy = a.1 - b.1;
    if dx.abs() < 1e-3 && dy.abs() < 1e-3 {
        dx = if i < j { -0.01 } else { 0.01 };
        dy = 0.01;
    }
    let dist = (dx * dx + dy * dy).sqrt().max(0.01);
    (dx, dy, dist)
}
