use crate::model::NodeId;

use super::types::{IndexEntry, Point, PositionIndex, PositionedTree};

/// Resolves parent-relative positions into absolute ones, top-down.
/// Writes the result into the tree's nodes and returns the index the
/// refiner works on.
pub fn flatten(tree: &mut PositionedTree) -> PositionIndex {
    let mut index = PositionIndex::with_capacity(tree.len());
    let mut stack: Vec<(NodeId, Option<NodeId>, Point)> = tree
        .roots
        .iter()
        .rev()
        .map(|id| (*id, None, Point::ORIGIN))
        .collect();

    while let Some((id, parent, origin)) = stack.pop() {
        let node = tree.node_mut(id);
        let absolute = origin.offset(node.relative);
        node.absolute = absolute;
        index.insert(id, IndexEntry { absolute, parent });
        for child in node.children.iter().rev() {
            stack.push((*child, Some(id), absolute));
        }
    }
    index
}

/// Translates the root scope so its bounding box starts at (0, 0) again.
/// Refinement can push nodes to negative coordinates; relative positions
/// below the root scope are unaffected.
pub fn anchor_roots(tree: &mut PositionedTree, index: &mut PositionIndex) {
    let roots = tree.roots.clone();
    if roots.is_empty() {
        return;
    }
    let min_x = roots
        .iter()
        .map(|id| tree.node(*id).absolute.x)
        .fold(f32::INFINITY, f32::min);
    let min_y = roots
        .iter()
        .map(|id| tree.node(*id).absolute.y)
        .fold(f32::INFINITY, f32::min);
    if min_x == 0.0 && min_y == 0.0 {
        return;
    }
    let delta = Point::new(-min_x, -min_y);
    for root in &roots {
        let node = tree.node_mut(*root);
        node.relative = node.relative.offset(delta);
    }
    let mut stack = roots;
    while let Some(id) = stack.pop() {
        if let Some(entry) = index.get_mut(id) {
            entry.absolute = entry.absolute.offset(delta);
        }
        let node = tree.node_mut(id);
        node.absolute = node.absolute.offset(delta);
        stack.extend(node.children.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::{RunRecord, TaskRecord};
    use crate::layout::grid::grid_tree;
    use crate::model::GraphBuilder;

    #[test]
    fn absolute_is_parent_plus_relative() {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("a"))
            .task(TaskRecord::leaf("outer_flow.inner_flow.x"))
            .task(TaskRecord::leaf("outer_flow.y"));
        let graph = GraphBuilder::default().build(&run).unwrap();
        let mut tree = grid_tree(&graph, &LayoutConfig::default());
        let index = flatten(&mut tree);

        assert_eq!(index.len(), graph.len());
        for (id, node) in graph.nodes() {
            let entry = index.get(id).unwrap();
            assert_eq!(entry.parent, node.parent);
            let parent_abs = node
                .parent
                .map(|p| index.absolute(p).unwrap())
                .unwrap_or(Point::ORIGIN);
            assert_eq!(entry.absolute, parent_abs.offset(tree.node(id).relative));
            assert_eq!(tree.node(id).absolute, entry.absolute);
        }
    }

    #[test]
    fn nested_offsets_accumulate() {
        let run = RunRecord::new("r", "run").task(TaskRecord::leaf("outer_flow.inner_flow.x"));
        let graph = GraphBuilder::default().build(&run).unwrap();
        let mut tree = grid_tree(&graph, &LayoutConfig::default());
        let index = flatten(&mut tree);
        let x = graph.get("outer_flow.inner_flow.x").unwrap();
        assert_eq!(index.absolute(x), Some(Point::new(32.0, 32.0)));
    }

    #[test]
    fn anchoring_moves_roots_back_to_origin() {
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::leaf("a"))
            .task(TaskRecord::leaf("hpl_flow.b"));
        let graph = GraphBuilder::default().build(&run).unwrap();
        let mut tree = grid_tree(&graph, &LayoutConfig::default());
        let group = graph.get("hpl_flow").unwrap();
        tree.node_mut(group).relative = Point::new(-70.0, 12.0);
        let mut index = flatten(&mut tree);

        anchor_roots(&mut tree, &mut index);
        let b = graph.get("hpl_flow.b").unwrap();
        assert_eq!(index.absolute(group), Some(Point::new(0.0, 12.0)));
        assert_eq!(tree.node(group).relative, Point::new(0.0, 12.0));
        assert_eq!(
            index.absolute(b),
            Some(Point::new(0.0, 12.0).offset(tree.node(b).relative))
        );
        let a = graph.get("a").unwrap();
        assert_eq!(index.absolute(a), Some(Point::new(70.0, 0.0)));
        assert_eq!(tree.node(a).relative, Point::new(70.0, 0.0));
    }
}
