use serde::Serialize;

use crate::config::Direction;
use crate::model::{NodeId, NodeKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, other: Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Coordinate on the axis orthogonal to the flow.
    pub fn cross(self, direction: Direction) -> f32 {
        if direction.is_vertical() { self.x } else { self.y }
    }

    pub fn set_cross(&mut self, direction: Direction, value: f32) {
        if direction.is_vertical() {
            self.x = value;
        } else {
            self.y = value;
        }
    }

    /// Coordinate along the flow.
    pub fn along(self, direction: Direction) -> f32 {
        if direction.is_vertical() { self.y } else { self.x }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSettings {
    pub kind: NodeKind,
    /// Inset between a container's border and its children.
    pub padding: f32,
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: NodeId,
    pub width: f32,
    pub height: f32,
    /// Top-left corner relative to the immediate parent's origin.
    pub relative: Point,
    /// Top-left corner in diagram space, filled in by the flattener.
    pub absolute: Point,
    pub children: Vec<NodeId>,
    pub settings: NodeSettings,
}

impl LayoutNode {
    pub fn cross_size(&self, direction: Direction) -> f32 {
        if direction.is_vertical() {
            self.width
        } else {
            self.height
        }
    }
}

/// Solver output: one entry per graph node, addressed by `NodeId`.
#[derive(Debug, Clone)]
pub struct PositionedTree {
    pub nodes: Vec<LayoutNode>,
    pub roots: Vec<NodeId>,
    pub width: f32,
    pub height: f32,
}

impl PositionedTree {
    pub fn node(&self, id: NodeId) -> &LayoutNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut LayoutNode {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexEntry {
    pub absolute: Point,
    pub parent: Option<NodeId>,
}

/// Absolute position of every node, rebuilt on each layout call.
#[derive(Debug, Clone, Default)]
pub struct PositionIndex {
    entries: Vec<Option<IndexEntry>>,
}

impl PositionIndex {
    pub fn with_capacity(len: usize) -> Self {
        Self {
            entries: vec![None; len],
        }
    }

    pub fn insert(&mut self, id: NodeId, entry: IndexEntry) {
        if id.index() >= self.entries.len() {
            self.entries.resize(id.index() + 1, None);
        }
        self.entries[id.index()] = Some(entry);
    }

    pub fn get(&self, id: NodeId) -> Option<&IndexEntry> {
        self.entries.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut IndexEntry> {
        self.entries.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn absolute(&self, id: NodeId) -> Option<Point> {
        self.get(id).map(|entry| entry.absolute)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<IndexEntry> {
        self.entries.get_mut(id.index()).and_then(Option::take)
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
