use std::convert::Infallible;

use crate::config::LayoutConfig;
use crate::model::FlowGraph;

use super::backend::{ScopeInput, drive};
use super::types::{Point, PositionedTree};

/// Deterministic placement used when a solver fails: member `i` goes to
/// column `i % columns`, row `i / columns`. Cells are as large as the
/// largest member of the scope.
pub fn place_grid(scope: &ScopeInput, config: &LayoutConfig) -> Vec<Point> {
    let columns = config.fallback_columns.max(1);
    let cell_width = scope.sizes.iter().map(|s| s.width).fold(0.0f32, f32::max);
    let cell_height = scope.sizes.iter().map(|s| s.height).fold(0.0f32, f32::max);
    (0..scope.len())
        .map(|i| {
            let column = (i % columns) as f32;
            let row = (i / columns) as f32;
            Point::new(
                column * (cell_width + config.node_spacing),
                row * (cell_height + config.layer_spacing),
            )
        })
        .collect()
}

/// Grid placement for every scope. Cannot fail.
pub fn grid_tree(graph: &FlowGraph, config: &LayoutConfig) -> PositionedTree {
    match drive(graph, config, |scope| {
        Ok::<_, Infallible>(place_grid(scope, config))
    }) {
        Ok(tree) => tree,
        Err(never) => match never {},
    }
}
