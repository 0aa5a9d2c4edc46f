#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod ir;
pub mod layout;
pub mod logging;
pub mod model;
pub mod output;
pub mod session;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Algorithm, Direction, LayoutConfig, Size, load_config, parse_config};
pub use error::{ConfigError, Error, LayoutError, ValidationError};
pub use ir::{DependencyRecord, RunRecord, TaskKind, TaskRecord};
pub use layout::{compute_layout, compute_layout_with, layout_run, layout_run_json};
pub use model::{FlowGraph, GraphBuilder, GroupRules, NodeId};
pub use output::{Diagnostic, LayoutResult, PositionedEdge, PositionedNode};
pub use session::{LayoutSession, LayoutTicket};
