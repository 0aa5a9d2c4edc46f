use crate::config::LayoutConfig;
use crate::error::LayoutError;

use super::backend::{ScopeInput, ScopeSolver, along_extent, cross_extent, orient};
use super::ranking::compute_ranks;
use super::types::Point;

/// Tidy tree packing. Every member hangs under its first predecessor from an
/// earlier rank; subtrees are packed side by side across the flow and each
/// parent is centered over its children.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSolver;

impl ScopeSolver for TreeSolver {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn place(&self, scope: &ScopeInput, config: &LayoutConfig) -> Result<Vec<Point>, LayoutError> {
        let len = scope.len();
        if len == 0 {
            return Ok(Vec::new());
        }
        let direction = config.direction;
        let ranks = compute_ranks(len, &scope.edges);

        let mut parent: Vec<Option<usize>> = vec![None; len];
        for &(from, to) in &scope.edges {
            if parent[to].is_none() && ranks[from] < ranks[to] {
                parent[to] = Some(from);
            }
        }
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); len];
        let mut roots = Vec::new();
        for idx in 0..len {
            match parent[idx] {
                Some(p) => children[p].push(idx),
                None => roots.push(idx),
            }
        }

        let depth = ranks.iter().copied().max().unwrap_or(0) + 1;
        let mut rank_extent = vec![0.0f32; depth];
        for (idx, rank) in ranks.iter().enumerate() {
            rank_extent[*rank] = rank_extent[*rank].max(along_extent(scope.sizes[idx], direction));
        }
        let mut rank_offset = vec![0.0f32; depth];
        for rank in 1..depth {
            rank_offset[rank] = rank_offset[rank - 1] + rank_extent[rank - 1] + config.layer_spacing;
        }

        let cross: Vec<f32> = scope
            .sizes
            .iter()
            .map(|size| cross_extent(*size, direction))
            .collect();
        let mut subtree = vec![0.0f32; len];
        for &root in &roots {
            measure(root, &children, &cross, config.node_spacing, &mut subtree);
        }

        let mut canonical = vec![(0.0f32, 0.0f32); len];
        let mut cursor = 0.0f32;
        for &root in &roots {
            assign(
                root,
                cursor,
                &children,
                &cross,
                &subtree,
                config.node_spacing,
                &mut canonical,
            );
            cursor += subtree[root] + config.node_spacing;
        }
        for (idx, rank) in ranks.iter().enumerate() {
            canonical[idx].1 = rank_offset[*rank];
        }

        Ok(orient(&canonical, &scope.sizes, direction))
    }
}

/// Cross-axis width of every subtree, children before parents.
fn measure(
    root: usize,
    children: &[Vec<usize>],
    cross: &[f32],
    spacing: f32,
    subtree: &mut [f32],
) {
    let mut order = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        order.push(node);
        stack.extend(children[node].iter().copied());
    }
    for &node in order.iter().rev() {
        let kids = &children[node];
        let total: f32 = kids.iter().map(|child| subtree[*child]).sum::<f32>()
            + spacing * kids.len().saturating_sub(1) as f32;
        subtree[node] = cross[node].max(total);
    }
}

fn assign(
    root: usize,
    start: f32,
    children: &[Vec<usize>],
    cross: &[f32],
    subtree: &[f32],
    spacing: f32,
    canonical: &mut [(f32, f32)],
) {
    let mut stack = vec![(root, start)];
    while let Some((node, start)) = stack.pop() {
        canonical[node].0 = start + (subtree[node] - cross[node]) / 2.0;
        let kids = &children[node];
        if kids.is_empty() {
            continue;
        }
        let total: f32 = kids.iter().map(|child| subtree[*child]).sum::<f32>()
            + spacing * (kids.len() - 1) as f32;
        let mut cursor = start + (subtree[node] - total) / 2.0;
        for child in kids {
            stack.push((*child, cursor));
            cursor += subtree[*child] + spacing;
        }
    }
}
