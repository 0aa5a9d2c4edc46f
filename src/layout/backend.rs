//! Geometry for nested scopes.
//!
//! A [`ScopeSolver`] only ever sees one scope at a time: the members of the
//! root graph or of a single group, with their sizes and the dependencies
//! between them. [`layout_tree`] walks the hierarchy bottom-up so that a
//! group's size is known before the scope containing it is placed.

use std::collections::HashSet;

use crate::config::{Algorithm, Direction, LayoutConfig, Size};
use crate::error::LayoutError;
use crate::model::{FlowGraph, NodeId, NodeKind};

use super::force::ForceSolver;
use super::layered::LayeredSolver;
use super::tree::TreeSolver;
use super::types::{LayoutNode, NodeSettings, Point, PositionedTree};

/// Members of one scope as handed to a solver.
#[derive(Debug, Clone, Default)]
pub struct ScopeInput {
    pub keys: Vec<String>,
    pub sizes: Vec<Size>,
    /// Index pairs into `keys`; endpoints outside the scope have already been
    /// lifted to the member that contains them.
    pub edges: Vec<(usize, usize)>,
}

impl ScopeInput {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

pub trait ScopeSolver {
    fn name(&self) -> &'static str;

    /// Top-left corner for every member, in member order. Any consistent
    /// origin is fine; the caller normalizes the scope to start at (0, 0).
    fn place(&self, scope: &ScopeInput, config: &LayoutConfig) -> Result<Vec<Point>, LayoutError>;
}

pub fn solver_for(algorithm: Algorithm) -> Box<dyn ScopeSolver + Send + Sync> {
    match algorithm {
        Algorithm::Layered => Box::new(LayeredSolver),
        Algorithm::Tree => Box::new(TreeSolver),
        Algorithm::Force => Box::new(ForceSolver),
    }
}

/// Lays out every scope with `solver`, failing on the first scope it cannot place.
pub fn layout_tree(
    graph: &FlowGraph,
    config: &LayoutConfig,
    solver: &dyn ScopeSolver,
) -> Result<PositionedTree, LayoutError> {
    drive(graph, config, |scope| {
        let positions = solver.place(scope, config)?;
        check_positions(solver.name(), scope, &positions)?;
        Ok(positions)
    })
}

pub(super) fn drive<E, F>(
    graph: &FlowGraph,
    config: &LayoutConfig,
    mut place: F,
) -> Result<PositionedTree, E>
where
    F: FnMut(&ScopeInput) -> Result<Vec<Point>, E>,
{
    let mut nodes: Vec<LayoutNode> = graph
        .nodes()
        .map(|(id, node)| {
            let size = match node.kind {
                NodeKind::Leaf => config.leaf_size,
                NodeKind::Group => config.group_size,
            };
            LayoutNode {
                id,
                width: size.width,
                height: size.height,
                relative: Point::ORIGIN,
                absolute: Point::ORIGIN,
                children: node.children.clone(),
                settings: NodeSettings {
                    kind: node.kind,
                    padding: if node.is_group() { config.padding } else { 0.0 },
                },
            }
        })
        .collect();

    for group in graph.groups_bottom_up() {
        let members = graph.scope(Some(group));
        if members.is_empty() {
            continue;
        }
        let input = scope_input(graph, Some(group), &nodes);
        let positions = place(&input)?;
        let (placed, extent) = normalize(&positions, &input.sizes);
        let padding = nodes[group.index()].settings.padding;
        for (member, pos) in members.iter().zip(placed) {
            nodes[member.index()].relative = Point::new(pos.x + padding, pos.y + padding);
        }
        let container = &mut nodes[group.index()];
        container.width = (extent.width + padding * 2.0).max(config.group_size.width);
        container.height = (extent.height + padding * 2.0).max(config.group_size.height);
    }

    let roots = graph.roots().to_vec();
    let mut extent = Size::new(0.0, 0.0);
    if !roots.is_empty() {
        let input = scope_input(graph, None, &nodes);
        let positions = place(&input)?;
        let (placed, root_extent) = normalize(&positions, &input.sizes);
        for (member, pos) in roots.iter().zip(placed) {
            nodes[member.index()].relative = pos;
        }
        extent = root_extent;
    }

    Ok(PositionedTree {
        nodes,
        roots,
        width: extent.width,
        height: extent.height,
    })
}

fn scope_input(graph: &FlowGraph, scope: Option<NodeId>, nodes: &[LayoutNode]) -> ScopeInput {
    let members = graph.scope(scope);
    let position_of = |id: NodeId| members.iter().position(|member| *member == id);

    let mut edges = Vec::new();
    let mut seen: HashSet<(usize, usize)> = HashSet::new();
    for edge in graph.edges() {
        let (Some(source), Some(target)) = (
            graph.member_of_scope(scope, edge.source),
            graph.member_of_scope(scope, edge.target),
        ) else {
            continue;
        };
        if source == target {
            continue;
        }
        let (Some(from), Some(to)) = (position_of(source), position_of(target)) else {
            continue;
        };
        if seen.insert((from, to)) {
            edges.push((from, to));
        }
    }

    ScopeInput {
        keys: members
            .iter()
            .map(|id| graph.node(*id).key.clone())
            .collect(),
        sizes: members
            .iter()
            .map(|id| {
                let node = &nodes[id.index()];
                Size::new(node.width, node.height)
            })
            .collect(),
        edges,
    }
}

fn check_positions(
    solver: &'static str,
    scope: &ScopeInput,
    positions: &[Point],
) -> Result<(), LayoutError> {
    if positions.len() != scope.len() {
        return Err(LayoutError::PositionCount {
            solver,
            expected: scope.len(),
            got: positions.len(),
        });
    }
    for (key, pos) in scope.keys.iter().zip(positions) {
        if !pos.is_finite() {
            return Err(LayoutError::UnusableGeometry {
                solver,
                node: key.clone(),
            });
        }
    }
    Ok(())
}

/// Shifts positions so the bounding box starts at the origin and returns its size.
fn normalize(positions: &[Point], sizes: &[Size]) -> (Vec<Point>, Size) {
    if positions.is_empty() {
        return (Vec::new(), Size::new(0.0, 0.0));
    }
    let min_x = positions.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let min_y = positions.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let mut max_x = 0.0f32;
    let mut max_y = 0.0f32;
    let placed: Vec<Point> = positions
        .iter()
        .map(|p| Point::new(p.x - min_x, p.y - min_y))
        .collect();
    for (pos, size) in placed.iter().zip(sizes) {
        max_x = max_x.max(pos.x + size.width);
        max_y = max_y.max(pos.y + size.height);
    }
    (placed, Size::new(max_x, max_y))
}

/// Extent of a node across the flow for `direction`.
pub(super) fn cross_extent(size: Size, direction: Direction) -> f32 {
    if direction.is_vertical() {
        size.width
    } else {
        size.height
    }
}

/// Extent of a node along the flow for `direction`.
pub(super) fn along_extent(size: Size, direction: Direction) -> f32 {
    if direction.is_vertical() {
        size.height
    } else {
        size.width
    }
}

/// Maps `(cross, along)` top-left coordinates computed for a top-down flow
/// onto `direction`, mirroring the along axis for `up` and `left`.
pub(super) fn orient(canonical: &[(f32, f32)], sizes: &[Size], direction: Direction) -> Vec<Point> {
    let along_max = canonical
        .iter()
        .zip(sizes)
        .map(|((_, along), size)| along + along_extent(*size, direction))
        .fold(0.0f32, f32::max);
    canonical
        .iter()
        .zip(sizes)
        .map(|((cross, along), size)| {
            let along = if direction.is_reversed() {
                along_max - along - along_extent(*size, direction)
            } else {
                *along
            };
            if direction.is_vertical() {
                Point::new(*cross, along)
            } else {
                Point::new(along, *cross)
            }
        })
        .collect()
}
