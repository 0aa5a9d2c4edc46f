//! Predecessor alignment.
//!
//! Solvers optimize the picture as a whole and routinely leave a task a few
//! pixels off the task it depends on. This pass moves every task with
//! predecessors so that its center on the cross axis matches them: the
//! predecessor's center when there is one, the midpoint between the outermost
//! predecessors when there are several. Updates are applied in place and are
//! visible to the very next task (Gauss-Seidel), and a fixed number of passes
//! lets corrections travel along chains. Coordinates along the flow are left
//! exactly as the solver produced them.

use tracing::debug;

use crate::config::{Direction, LayoutConfig};
use crate::model::{FlowGraph, NodeId};

use super::types::{PositionIndex, PositionedTree};

const EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy)]
pub struct AlignmentRefiner {
    direction: Direction,
    passes: usize,
}

impl AlignmentRefiner {
    pub fn new(direction: Direction, passes: usize) -> Self {
        Self { direction, passes }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(config.direction, config.alignment_passes)
    }

    /// Returns how many node moves were applied over all passes.
    pub fn refine(
        &self,
        graph: &FlowGraph,
        tree: &mut PositionedTree,
        index: &mut PositionIndex,
    ) -> usize {
        let direction = self.direction;
        let mut moves = 0;
        for pass in 0..self.passes {
            let mut moved_this_pass = 0;
            for &target in graph.dependency_order() {
                let Some(desired) = self.desired_center(graph, tree, index, target) else {
                    continue;
                };
                let Some(entry) = index.get(target).copied() else {
                    continue;
                };
                let parent_cross = entry
                    .parent
                    .and_then(|parent| index.absolute(parent))
                    .map_or(0.0, |abs| abs.cross(direction));
                let size = tree.node(target).cross_size(direction);
                let relative = desired - size / 2.0 - parent_cross;
                let delta = parent_cross + relative - entry.absolute.cross(direction);
                if delta.abs() < EPSILON {
                    continue;
                }
                tree.node_mut(target).relative.set_cross(direction, relative);
                shift_subtree(tree, index, target, delta, direction);
                moved_this_pass += 1;
            }
            debug!(pass, moved = moved_this_pass, "alignment pass");
            moves += moved_this_pass;
        }
        moves
    }

    fn desired_center(
        &self,
        graph: &FlowGraph,
        tree: &PositionedTree,
        index: &PositionIndex,
        target: NodeId,
    ) -> Option<f32> {
        let direction = self.direction;
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        let mut count = 0usize;
        for &pred in &graph.node(target).predecessors {
            let Some(abs) = index.absolute(pred) else {
                continue;
            };
            let center = abs.cross(direction) + tree.node(pred).cross_size(direction) / 2.0;
            lo = lo.min(center);
            hi = hi.max(center);
            count += 1;
        }
        match count {
            0 => None,
            1 => Some(lo),
            _ => Some((lo + hi) / 2.0),
        }
    }
}

/// Moves `root` and everything nested in it by `delta` on the cross axis,
/// keeping absolute = parent + relative for the descendants.
fn shift_subtree(
    tree: &mut PositionedTree,
    index: &mut PositionIndex,
    root: NodeId,
    delta: f32,
    direction: Direction,
) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if let Some(entry) = index.get_mut(id) {
            let cross = entry.absolute.cross(direction);
            entry.absolute.set_cross(direction, cross + delta);
        }
        let node = tree.node_mut(id);
        let cross = node.absolute.cross(direction);
        node.absolute.set_cross(direction, cross + delta);
        stack.extend(node.children.iter().copied());
    }
}
