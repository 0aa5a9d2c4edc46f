use crate::config::{Algorithm, Direction, LayoutConfig, load_config};
use crate::layout::layout_run;
use crate::ir::RunRecord;
use crate::logging::{LogConfig, LogFormat, LogLevel, init_logging};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sfl", version, about = "Lay out workflow runs with nested subflows")]
pub struct Args {
    /// Run record JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout JSON. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Layout config file (JSON or JSON5)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// layered, tree or force
    #[arg(short = 'a', long = "algorithm")]
    pub algorithm: Option<Algorithm>,

    /// down, right, up or left (td/lr/bt/rl accepted)
    #[arg(short = 'd', long = "direction")]
    pub direction: Option<Direction>,

    /// Alignment passes; 0 disables refinement
    #[arg(long = "passes")]
    pub passes: Option<usize>,

    #[arg(long = "pretty")]
    pub pretty: bool,

    #[arg(long = "log-level", value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    #[arg(long = "log-format", value_enum, default_value = "pretty")]
    pub log_format: LogFormat,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(&LogConfig {
        level: args.log_level,
        format: args.log_format,
    })?;

    let config = resolve_config(&args)?;
    let input = read_input(args.input.as_deref())?;
    let run: RunRecord = serde_json::from_str(&input).context("invalid run record")?;
    let result = layout_run(&run, &config)?;
    info!(
        run = %result.run_id,
        nodes = result.nodes.len(),
        edges = result.edges.len(),
        fallbacks = result.diagnostics.len(),
        "layout complete"
    );
    write_output(&result.to_json(args.pretty)?, args.output.as_deref())
}

fn resolve_config(args: &Args) -> Result<LayoutConfig> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(direction) = args.direction {
        config.direction = direction;
    }
    if let Some(passes) = args.passes {
        config.alignment_passes = passes;
    }
    Ok(config)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(json: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let args = Args::try_parse_from([
            "sfl",
            "--algorithm",
            "tree",
            "--direction",
            "lr",
            "--passes",
            "0",
        ])
        .unwrap();
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.algorithm, Algorithm::Tree);
        assert_eq!(config.direction, Direction::Right);
        assert_eq!(config.alignment_passes, 0);
        assert_eq!(config.node_spacing, LayoutConfig::default().node_spacing);
    }

    #[test]
    fn rejects_unknown_algorithm() {
        assert!(Args::try_parse_from(["sfl", "--algorithm", "radial"]).is_err());
    }

    #[test]
    fn log_flags_parse() {
        let args = Args::try_parse_from(["sfl", "--log-level", "debug", "--log-format", "json"])
            .unwrap();
        assert_eq!(args.log_level, LogLevel::Debug);
        assert_eq!(args.log_format, LogFormat::Json);
        assert!(!args.pretty);
    }
}
