//! Logging setup for bridge hosts
//!
//! The crate itself only emits `tracing` events (targets `graft::registry`,
//! `graft::ops`, `graft::errors`, `graft::bridge`, `graft::config`). Installing
//! a subscriber is left to the embedding host; these helpers cover the common
//! setups.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format with timestamps
    #[default]
    Pretty,
    Compact,
    /// Structured JSON lines
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// File with daily rotation
    File { directory: String, prefix: String },
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span open/close events
    pub span_events: bool,
    /// Extra filter directives (e.g. "graft::ops=trace")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Install the global subscriber
///
/// Returns the writer guard; keep it alive until exit so buffered lines are
/// flushed. Returns `None` when a subscriber was already installed.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };
    install(&config, writer).then_some(guard)
}

static CONFIGURED: OnceCell<Option<WorkerGuard>> = OnceCell::new();

/// Install the global subscriber at most once per process
///
/// The writer guard is kept for the life of the process. Returns true only
/// for the call that installed the subscriber.
pub fn init_logging_once(config: LogConfig) -> bool {
    let mut installed = false;
    CONFIGURED.get_or_init(|| {
        let guard = init_logging(config);
        installed = guard.is_some();
        guard
    });
    installed
}

fn install<W>(config: &LogConfig, writer: W) -> bool
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = build_filter(config);
    let spans = span_events_config(config.span_events);
    let base = fmt::layer().with_writer(writer).with_span_events(spans);
    let layer = match config.format {
        LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
        LogFormat::Compact => base.compact().with_filter(filter).boxed(),
        LogFormat::Json => base.json().with_filter(filter).boxed(),
    };
    tracing_subscriber::registry().with(layer).try_init().is_ok()
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::from_default_env().add_directive(config.level.into());
    match &config.filter {
        Some(directives) => directives
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .fold(base, |filter, directive| match directive.parse() {
                Ok(parsed) => filter.add_directive(parsed),
                Err(_) => {
                    tracing::warn!("invalid filter directive: {}", directive);
                    filter
                }
            }),
        None => base,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Compact stderr logging for an embedded bridge; a no-op if a subscriber exists
pub fn init_bridge_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            EnvFilter::new("graft=debug")
        }
        #[cfg(not(debug_assertions))]
        {
            EnvFilter::new("graft=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .ok();
}

/// JSON logs under `log_dir`, rotated daily
pub fn init_file_logging(log_dir: impl AsRef<Path>) -> Option<WorkerGuard> {
    init_logging(LogConfig {
        level: Level::INFO,
        format: LogFormat::Json,
        output: LogOutput::File {
            directory: log_dir.as_ref().to_string_lossy().to_string(),
            prefix: "graft".to_string(),
        },
        span_events: false,
        filter: Some("graft=info".to_string()),
    })
}
