use crate::error::ConfigError;
use crate::model::GroupRules;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Default grouping rule: `<name>_flow.<rest>` belongs to subflow `<name>_flow`.
pub const DEFAULT_GROUP_PATTERN: &str = r"^(?P<group>[^.]+_flow)\.(?P<rest>.+)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Layered,
    Tree,
    Force,
}

impl Algorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Layered => "layered",
            Algorithm::Tree => "tree",
            Algorithm::Force => "force",
        }
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "layered" | "dagre" | "elk.layered" => Ok(Self::Layered),
            "tree" | "mrtree" => Ok(Self::Tree),
            "force" => Ok(Self::Force),
            other => Err(ConfigError::InvalidValue {
                field: "algorithm",
                message: format!("unknown algorithm `{other}`"),
            }),
        }
    }
}

/// Primary flow direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Down,
    Right,
    Up,
    Left,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "down" | "td" | "tb" => Some(Self::Down),
            "right" | "lr" => Some(Self::Right),
            "up" | "bt" => Some(Self::Up),
            "left" | "rl" => Some(Self::Left),
            _ => None,
        }
    }

    /// Flow runs along the y axis.
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::Down | Direction::Up)
    }

    /// Flow runs towards decreasing coordinates.
    pub fn is_reversed(self) -> bool {
        matches!(self, Direction::Up | Direction::Left)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Left => "left",
        }
    }
}

impl FromStr for Direction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::from_token(s).ok_or_else(|| ConfigError::InvalidValue {
            field: "direction",
            message: format!("unknown direction `{s}`"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceConfig {
    pub iterations: usize,
    /// Preferred edge length as a multiple of the layer spacing.
    pub edge_length_factor: f32,
    pub repulsion: f32,
    pub cooling: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            iterations: 120,
            edge_length_factor: 2.0,
            repulsion: 1.0,
            cooling: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub algorithm: Algorithm,
    pub direction: Direction,
    pub node_spacing: f32,
    pub layer_spacing: f32,
    pub padding: f32,
    pub leaf_size: Size,
    pub group_size: Size,
    pub alignment_passes: usize,
    pub fallback_columns: usize,
    pub group_patterns: Vec<String>,
    pub sibling_priority: Vec<String>,
    pub force: ForceConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Layered,
            direction: Direction::Down,
            node_spacing: 32.0,
            layer_spacing: 48.0,
            padding: 16.0,
            leaf_size: Size::new(260.0, 36.0),
            group_size: Size::new(120.0, 80.0),
            alignment_passes: 2,
            fallback_columns: 4,
            group_patterns: vec![DEFAULT_GROUP_PATTERN.to_string()],
            sibling_priority: Vec::new(),
            force: ForceConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lengths = [
            ("nodeSpacing", self.node_spacing),
            ("layerSpacing", self.layer_spacing),
            ("padding", self.padding),
            ("leafSize.width", self.leaf_size.width),
            ("leafSize.height", self.leaf_size.height),
            ("groupSize.width", self.group_size.width),
            ("groupSize.height", self.group_size.height),
        ];
        for (field, value) in lengths {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "length",
                    message: format!("{field} must be a finite non-negative number, got {value}"),
                });
            }
        }
        if self.fallback_columns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fallbackColumns",
                message: "must be at least 1".to_string(),
            });
        }
        GroupRules::from_patterns(&self.group_patterns)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SizeFile {
    width: Option<f32>,
    height: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ForceConfigFile {
    iterations: Option<usize>,
    edge_length_factor: Option<f32>,
    repulsion: Option<f32>,
    cooling: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    algorithm: Option<String>,
    direction: Option<String>,
    node_spacing: Option<f32>,
    layer_spacing: Option<f32>,
    padding: Option<f32>,
    leaf_size: Option<SizeFile>,
    group_size: Option<SizeFile>,
    alignment_passes: Option<usize>,
    fallback_columns: Option<usize>,
    group_patterns: Option<Vec<String>>,
    sibling_priority: Option<Vec<String>>,
    force: Option<ForceConfigFile>,
}

/// Loads a JSON (or JSON5) file of optional overrides on top of the defaults.
pub fn load_config(path: Option<&Path>) -> Result<LayoutConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(LayoutConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> Result<LayoutConfig, ConfigError> {
    let parsed: ConfigFile =
        json5::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
    let mut config = LayoutConfig::default();

    if let Some(v) = parsed.algorithm {
        config.algorithm = v.parse()?;
    }
    if let Some(v) = parsed.direction {
        config.direction = v.parse()?;
    }
    if let Some(v) = parsed.node_spacing {
        config.node_spacing = v;
    }
    if let Some(v) = parsed.layer_spacing {
        config.layer_spacing = v;
    }
    if let Some(v) = parsed.padding {
        config.padding = v;
    }
    if let Some(size) = parsed.leaf_size {
        merge_size(&mut config.leaf_size, size);
    }
    if let Some(size) = parsed.group_size {
        merge_size(&mut config.group_size, size);
    }
    if let Some(v) = parsed.alignment_passes {
        config.alignment_passes = v;
    }
    if let Some(v) = parsed.fallback_columns {
        config.fallback_columns = v;
    }
    if let Some(v) = parsed.group_patterns {
        config.group_patterns = v;
    }
    if let Some(v) = parsed.sibling_priority {
        config.sibling_priority = v;
    }
    if let Some(force) = parsed.force {
        if let Some(v) = force.iterations {
            config.force.iterations = v;
        }
        if let Some(v) = force.edge_length_factor {
            config.force.edge_length_factor = v;
        }
        if let Some(v) = force.repulsion {
            config.force.repulsion = v;
        }
        if let Some(v) = force.cooling {
            config.force.cooling = v;
        }
    }

    config.validate()?;
    Ok(config)
}

fn merge_size(size: &mut Size, file: SizeFile) {
    if let Some(width) = file.width {
        size.width = width;
    }
    if let Some(height) = file.height {
        size.height = height;
    }
}
