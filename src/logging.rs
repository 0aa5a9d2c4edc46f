//! Where the pipeline's `tracing` events go.
//!
//! The library only emits events. The `sfl` binary, or whatever embeds the
//! crate, picks a sink once with [`init_logging`]. Events always go to stderr
//! because stdout carries the layout JSON.

use anyhow::anyhow;
use tracing::Level;

/// Most verbose level that reaches the sink. `Warn` shows grid fallbacks and
/// ignored duplicate records; `Debug` adds per-stage and per-pass events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// `Json` emits one object per event for log shippers; `Pretty` is the
/// human-readable line format without module targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

/// Installs the global subscriber. A second call fails instead of replacing
/// the first sink.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(config.level.as_tracing())
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.with_target(false).try_init(),
    }
    .map_err(|err| anyhow!("cannot install log subscriber: {err}"))
}
