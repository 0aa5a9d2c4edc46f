pub mod align;
pub mod backend;
pub mod flatten;
mod force;
pub mod grid;
mod layered;
mod ranking;
mod tree;
mod types;

pub use align::AlignmentRefiner;
pub use backend::{ScopeInput, ScopeSolver, layout_tree, solver_for};
pub use force::ForceSolver;
pub use layered::LayeredSolver;
pub use tree::TreeSolver;
pub use types::*;

use tracing::{debug, warn};

use crate::config::LayoutConfig;
use crate::error::Error;
use crate::ir::RunRecord;
use crate::model::{FlowGraph, GraphBuilder};
use crate::output::{Diagnostic, LayoutResult, build_result};

use flatten::{anchor_roots, flatten};
use grid::grid_tree;

/// Positions every node of `graph` with the configured algorithm.
///
/// Never fails: a solver error switches the whole tree to the grid placement
/// and is reported through [`LayoutResult::diagnostics`].
pub fn compute_layout(graph: &FlowGraph, config: &LayoutConfig) -> LayoutResult {
    let solver = solver_for(config.algorithm);
    compute_layout_with(graph, config, solver.as_ref())
}

pub fn compute_layout_with(
    graph: &FlowGraph,
    config: &LayoutConfig,
    solver: &dyn ScopeSolver,
) -> LayoutResult {
    let mut diagnostics = Vec::new();
    let mut tree = match layout_tree(graph, config, solver) {
        Ok(tree) => tree,
        Err(err) => {
            warn!(
                run = %graph.id,
                solver = solver.name(),
                error = %err,
                "solver failed, using grid placement"
            );
            diagnostics.push(Diagnostic {
                stage: "solver",
                message: err.to_string(),
            });
            grid_tree(graph, config)
        }
    };
    debug!(
        run = %graph.id,
        nodes = tree.len(),
        width = tree.width,
        height = tree.height,
        "scopes placed"
    );

    let mut index = flatten(&mut tree);
    let moves = AlignmentRefiner::from_config(config).refine(graph, &mut tree, &mut index);
    anchor_roots(&mut tree, &mut index);
    debug!(run = %graph.id, moves, "alignment finished");

    build_result(graph, &tree, &index, config, diagnostics)
}

/// Builds the graph for `run` and lays it out.
pub fn layout_run(run: &RunRecord, config: &LayoutConfig) -> Result<LayoutResult, Error> {
    let graph = GraphBuilder::from_config(config)?.build(run)?;
    Ok(compute_layout(&graph, config))
}

/// JSON in, JSON out. Used by the WASM binding and the CLI.
pub fn layout_run_json(run_json: &str, config: &LayoutConfig, pretty: bool) -> Result<String, Error> {
    let run: RunRecord = serde_json::from_str(run_json)?;
    let result = layout_run(&run, config)?;
    Ok(result.to_json(pretty)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Algorithm, Direction};
    use crate::error::LayoutError;
    use crate::ir::TaskRecord;

    struct FailingSolver;

    impl ScopeSolver for FailingSolver {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn place(&self, _: &ScopeInput, _: &LayoutConfig) -> Result<Vec<Point>, LayoutError> {
            Err(LayoutError::Solver {
                solver: "failing",
                message: "boom".to_string(),
            })
        }
    }

    fn sample() -> RunRecord {
        RunRecord::new("run-1", "nightly")
            .task(TaskRecord::leaf("a"))
            .task(TaskRecord::leaf("hpl_flow.b"))
            .task(TaskRecord::leaf("hpl_flow.c"))
            .depends("a", "hpl_flow.b")
            .depends("hpl_flow.b", "hpl_flow.c")
    }

    #[test]
    fn failing_solver_falls_back_to_grid() {
        let graph = GraphBuilder::default().build(&sample()).unwrap();
        let result = compute_layout_with(&graph, &LayoutConfig::default(), &FailingSolver);
        assert_eq!(result.nodes.len(), graph.len());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].stage, "solver");
        assert!(result.diagnostics[0].message.contains("boom"));
        assert!(result.nodes.iter().all(|n| n.x.is_finite() && n.y.is_finite()));
    }

    #[test]
    fn every_algorithm_places_every_node() {
        for algorithm in [Algorithm::Layered, Algorithm::Tree, Algorithm::Force] {
            for direction in [Direction::Down, Direction::Right, Direction::Up, Direction::Left] {
                let config = LayoutConfig {
                    algorithm,
                    direction,
                    ..LayoutConfig::default()
                };
                let result = layout_run(&sample(), &config).unwrap();
                assert_eq!(result.nodes.len(), 4, "{algorithm:?} {direction:?}");
                assert!(result.diagnostics.is_empty(), "{algorithm:?} {direction:?}");
                assert!(result.width > 0.0 && result.height > 0.0);
            }
        }
    }

    #[test]
    fn extent_starts_at_origin_after_alignment() {
        // The leaf is wider than the group it follows, so centering it on the
        // group pushes it left of the origin before anchoring.
        let run = RunRecord::new("r", "run")
            .task(TaskRecord::flow("g_flow"))
            .task(TaskRecord::leaf("p"))
            .task(TaskRecord::leaf("q"))
            .task(TaskRecord::leaf("t"))
            .task(TaskRecord::leaf("u"))
            .depends("g_flow", "t")
            .depends("p", "u")
            .depends("q", "u")
            .depends("t", "u");
        for algorithm in [Algorithm::Layered, Algorithm::Tree, Algorithm::Force] {
            for direction in [Direction::Down, Direction::Right, Direction::Up, Direction::Left] {
                let config = LayoutConfig {
                    algorithm,
                    direction,
                    ..LayoutConfig::default()
                };
                let result = layout_run(&run, &config).unwrap();
                let roots: Vec<_> = result.nodes.iter().filter(|n| n.parent_id.is_none()).collect();
                let min_x = roots.iter().map(|n| n.x).fold(f32::INFINITY, f32::min);
                let min_y = roots.iter().map(|n| n.y).fold(f32::INFINITY, f32::min);
                let max_x = roots.iter().map(|n| n.x + n.width).fold(0.0f32, f32::max);
                let max_y = roots.iter().map(|n| n.y + n.height).fold(0.0f32, f32::max);
                let label = format!("{algorithm:?} {direction:?}");
                assert!(min_x.abs() < 1e-3 && min_y.abs() < 1e-3, "{label}: ({min_x}, {min_y})");
                assert!((result.width - max_x).abs() < 1e-3, "{label}");
                assert!((result.height - max_y).abs() < 1e-3, "{label}");

                let center = |id: &str| {
                    let n = result.node(id).unwrap();
                    if direction.is_vertical() { n.x + n.width / 2.0 } else { n.y + n.height / 2.0 }
                };
                assert!((center("t") - center("g_flow")).abs() < 1e-3, "{label}");
            }
        }
    }

    #[test]
    fn json_entry_point_rejects_bad_records() {
        let config = LayoutConfig::default();
        let err = layout_run_json(r#"{"id":"r","tasks":[{"kind":"leaf"}]}"#, &config, false)
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = layout_run_json("not json", &config, false).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
