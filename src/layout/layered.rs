use std::any::Any;
use std::cell::Cell;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe, catch_unwind};
use std::sync::Once;

use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};

use crate::config::{Direction, LayoutConfig};
use crate::error::LayoutError;

use super::backend::{ScopeInput, ScopeSolver};
use super::types::Point;

const SOLVER: &str = "layered";

/// Sugiyama-style layering through dagre.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredSolver;

impl ScopeSolver for LayeredSolver {
    fn name(&self) -> &'static str {
        SOLVER
    }

    fn place(&self, scope: &ScopeInput, config: &LayoutConfig) -> Result<Vec<Point>, LayoutError> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        // dagre asserts on inconsistent internal state instead of returning errors.
        quietly(|| run_dagre(scope, config)).map_err(|panic| LayoutError::Solver {
            solver: SOLVER,
            message: panic_message(panic.as_ref()),
        })?
    }
}

thread_local! {
    static SILENCED: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// `catch_unwind` that keeps the panic hook from printing to stderr. The
/// message is reported through the returned error instead. Panics on other
/// threads, or outside `f`, still reach the previously installed hook.
fn quietly<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !SILENCED.with(Cell::get) {
                previous(info);
            }
        }));
    });
    SILENCED.with(|flag| flag.set(true));
    let result = catch_unwind(AssertUnwindSafe(f));
    SILENCED.with(|flag| flag.set(false));
    result
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "solver panicked".to_string())
}

fn run_dagre(scope: &ScopeInput, config: &LayoutConfig) -> Result<Vec<Point>, LayoutError> {
    let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
        DagreGraph::new(Some(GraphOption {
            directed: Some(true),
            multigraph: Some(false),
            compound: Some(false),
        }));

    let mut graph_config = DagreConfig::default();
    graph_config.rankdir = Some(dagre_rankdir(config.direction).to_string());
    graph_config.nodesep = Some(config.node_spacing);
    graph_config.ranksep = Some(config.layer_spacing);
    graph_config.marginx = Some(0.0);
    graph_config.marginy = Some(0.0);
    dagre_graph.set_graph(graph_config);

    for (idx, (key, size)) in scope.keys.iter().zip(&scope.sizes).enumerate() {
        let mut node = DagreNode::default();
        node.width = size.width;
        node.height = size.height;
        node.order = Some(idx);
        dagre_graph.set_node(key.clone(), Some(node));
    }

    let mut edge_set: HashSet<(usize, usize)> = HashSet::new();
    for &(from, to) in &scope.edges {
        if from == to || !edge_set.insert((from, to)) {
            continue;
        }
        let edge_label = DagreEdge::default();
        let _ = dagre_graph.set_edge(&scope.keys[from], &scope.keys[to], Some(edge_label), None);
    }

    dagre_layout::run_layout(&mut dagre_graph);

    let mut positions = Vec::with_capacity(scope.len());
    for (key, size) in scope.keys.iter().zip(&scope.sizes) {
        let Some(dagre_node) = dagre_graph.node(key) else {
            return Err(LayoutError::UnusableGeometry {
                solver: SOLVER,
                node: key.clone(),
            });
        };
        positions.push(Point::new(
            dagre_node.x - size.width / 2.0,
            dagre_node.y - size.height / 2.0,
        ));
    }
    Ok(positions)
}

fn dagre_rankdir(direction: Direction) -> &'static str {
    match direction {
        Direction::Down => "tb",
        Direction::Up => "bt",
        Direction::Right => "lr",
        Direction::Left => "rl",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Size;

    fn chain() -> ScopeInput {
        ScopeInput {
            keys: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            sizes: vec![Size::new(100.0, 30.0); 3],
            edges: vec![(0, 1), (1, 2)],
        }
    }

    #[test]
    fn chain_flows_down() {
        let positions = LayeredSolver.place(&chain(), &LayoutConfig::default()).unwrap();
        assert_eq!(positions.len(), 3);
        assert!(positions[1].y > positions[0].y);
        assert!(positions[2].y > positions[1].y);
    }

    #[test]
    fn chain_flows_right() {
        let config = LayoutConfig {
            direction: Direction::Right,
            ..LayoutConfig::default()
        };
        let positions = LayeredSolver.place(&chain(), &config).unwrap();
        assert!(positions[1].x > positions[0].x);
        assert!(positions[2].x > positions[1].x);
    }

    #[test]
    fn solver_panics_become_messages() {
        let result: std::thread::Result<()> = quietly(|| panic!("rank out of range"));
        let panic = result.unwrap_err();
        assert_eq!(panic_message(panic.as_ref()), "rank out of range");
        assert!(!SILENCED.with(Cell::get));

        let value = quietly(|| 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn rankdir_tokens() {
        assert_eq!(dagre_rankdir(Direction::Down), "tb");
        assert_eq!(dagre_rankdir(Direction::Left), "rl");
    }
}
