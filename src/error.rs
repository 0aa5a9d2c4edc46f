use thiserror::Error;

/// Malformed input records. Raised before any geometry is computed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task record #{index} has no id")]
    MissingTaskId { index: usize },

    #[error("dependency record #{index} has no {side} id")]
    MissingEndpoint { index: usize, side: EndpointSide },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSide {
    Source,
    Target,
}

impl std::fmt::Display for EndpointSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointSide::Source => f.write_str("source"),
            EndpointSide::Target => f.write_str("target"),
        }
    }
}

/// A geometry solver could not place a scope. Never escapes `compute_layout`;
/// the pipeline switches to the grid placement instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    #[error("{solver} solver failed: {message}")]
    Solver {
        solver: &'static str,
        message: String,
    },

    #[error("{solver} solver returned unusable geometry for `{node}`")]
    UnusableGeometry { solver: &'static str, node: String },

    #[error("{solver} solver returned {got} positions for {expected} nodes")]
    PositionCount {
        solver: &'static str,
        expected: usize,
        got: usize,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid group pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid value for `{field}`: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

/// Crate-level error for the entry points that span several stages.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid run record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("layout task aborted: {0}")]
    Join(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
