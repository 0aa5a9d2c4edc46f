use std::cmp::Ordering;
use std::collections::HashSet;

use serde::Serialize;

use crate::config::{Algorithm, Direction, LayoutConfig};
use crate::ir::TaskRecord;
use crate::layout::{PositionIndex, PositionedTree};
use crate::model::{FlowGraph, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
    pub id: String,
    pub local_id: String,
    pub x: f32,
    pub y: f32,
    pub relative_x: f32,
    pub relative_y: f32,
    pub width: f32,
    pub height: f32,
    pub parent_id: Option<String>,
    pub kind: NodeKind,
    pub state: String,
    pub synthetic: bool,
    pub payload: Option<TaskRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionedEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// Non-fatal problem encountered while producing the layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub stage: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub run_id: String,
    pub name: String,
    pub algorithm: Algorithm,
    pub direction: Direction,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<PositionedEdge>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LayoutResult {
    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn children_of(&self, id: &str) -> Vec<&PositionedNode> {
        self.nodes
            .iter()
            .filter(|node| node.parent_id.as_deref() == Some(id))
            .collect()
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.source == source && edge.target == target)
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

pub fn build_result(
    graph: &FlowGraph,
    tree: &PositionedTree,
    index: &PositionIndex,
    config: &LayoutConfig,
    diagnostics: Vec<Diagnostic>,
) -> LayoutResult {
    let mut nodes = Vec::with_capacity(graph.len());
    let mut stack: Vec<NodeId> = sorted_siblings(graph, graph.roots(), config);
    stack.reverse();
    while let Some(id) = stack.pop() {
        let node = graph.node(id);
        let layout = tree.node(id);
        let absolute = index.absolute(id).unwrap_or(layout.absolute);
        nodes.push(PositionedNode {
            id: node.key.clone(),
            local_id: node.id.clone(),
            x: absolute.x,
            y: absolute.y,
            relative_x: layout.relative.x,
            relative_y: layout.relative.y,
            width: layout.width,
            height: layout.height,
            parent_id: node.parent.map(|parent| graph.node(parent).key.clone()),
            kind: node.kind,
            state: node.state.clone(),
            synthetic: node.synthetic,
            payload: node.payload.clone(),
        });
        let mut children = sorted_siblings(graph, &node.children, config);
        children.reverse();
        stack.extend(children);
    }

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut edges = Vec::with_capacity(graph.edges().len());
    for edge in graph.edges() {
        let source = graph.node(edge.source).key.as_str();
        let target = graph.node(edge.target).key.as_str();
        if !seen.insert((source, target)) {
            continue;
        }
        edges.push(PositionedEdge {
            id: format!("{source}->{target}"),
            source: source.to_string(),
            target: target.to_string(),
        });
    }

    let (width, height) = root_extent(&nodes);
    LayoutResult {
        run_id: graph.id.clone(),
        name: graph.name.clone(),
        algorithm: config.algorithm,
        direction: config.direction,
        width,
        height,
        nodes,
        edges,
        diagnostics,
    }
}

/// Declared priority first, then groups by the rule that created them, then
/// leaves; ties broken by local id.
fn sorted_siblings(graph: &FlowGraph, ids: &[NodeId], config: &LayoutConfig) -> Vec<NodeId> {
    let priority = |id: NodeId| -> (usize, usize) {
        let node = graph.node(id);
        let declared = config
            .sibling_priority
            .iter()
            .position(|name| *name == node.id || *name == node.key)
            .unwrap_or(usize::MAX);
        let kind_rank = match node.kind {
            NodeKind::Group => node.rule.unwrap_or(usize::MAX - 1),
            NodeKind::Leaf => usize::MAX,
        };
        (declared, kind_rank)
    };
    let mut sorted = ids.to_vec();
    sorted.sort_by(|a, b| match priority(*a).cmp(&priority(*b)) {
        Ordering::Equal => graph.node(*a).id.cmp(&graph.node(*b).id),
        other => other,
    });
    sorted
}

fn root_extent(nodes: &[PositionedNode]) -> (f32, f32) {
    let roots: Vec<&PositionedNode> = nodes.iter().filter(|n| n.parent_id.is_none()).collect();
    if roots.is_empty() {
        return (0.0, 0.0);
    }
    let min_x = roots.iter().map(|n| n.x).fold(f32::INFINITY, f32::min);
    let min_y = roots.iter().map(|n| n.y).fold(f32::INFINITY, f32::min);
    let max_x = roots.iter().map(|n| n.x + n.width).fold(f32::NEG_INFINITY, f32::max);
    let max_y = roots.iter().map(|n| n.y + n.height).fold(f32::NEG_INFINITY, f32::max);
    (max_x - min_x, max_y - min_y)
}
