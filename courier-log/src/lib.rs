//! Courier Logging
//!
//! Installs the global `tracing` subscriber for the courier worker. Every
//! other crate in the workspace logs through the `tracing` macros; this crate
//! only decides where those events go and how they are formatted.
//!
//! # Usage
//!
//! ```rust,no_run
//! // Keep the guard alive for the life of the process so the file writer
//! // flushes on shutdown.
//! let _guard = courier_log::init();
//! tracing::info!(queue = "emails", "worker starting");
//! ```
//!
//! # Environment Variables
//!
//! - `COURIER_DEBUG=1` - Enable debug logging
//! - `COURIER_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `COURIER_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `COURIER_LOG_COLOR=1|0` - Enable/disable colors
//! - `COURIER_LOG_DIR=/var/log/courier` - Also write a daily-rolled log file
//!
//! `RUST_LOG`, when set, overrides the level with a full filter directive.

use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::Layered};

// ============================================================================
// Levels and formats
// ============================================================================

/// Minimum severity that is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    /// Nothing is logged.
    Off,
}

// Accepted spellings; the first one for each level is its filter directive.
const LEVEL_NAMES: &[(Level, &[&str])] = &[
    (Level::Trace, &["trace"]),
    (Level::Debug, &["debug"]),
    (Level::Info, &["info"]),
    (Level::Warn, &["warn", "warning"]),
    (Level::Error, &["error"]),
    (Level::Off, &["off", "none"]),
];

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        LEVEL_NAMES
            .iter()
            .find(|(_, names)| names.iter().any(|name| name.eq_ignore_ascii_case(s)))
            .map(|(level, _)| *level)
    }

    /// Filter directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        LEVEL_NAMES
            .iter()
            .find(|(level, _)| level == self)
            .map_or("info", |(_, names)| names[0])
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_directive().to_ascii_uppercase())
    }
}

/// How events are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line, for a developer's terminal
    Pretty,
    Compact,
    /// One JSON object per line, for log shippers
    Json,
}

impl Format {
    pub fn parse(s: &str) -> Option<Self> {
        [Format::Pretty, Format::Compact, Format::Json]
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s.trim()))
    }

    fn name(&self) -> &'static str {
        match self {
            Format::Pretty => "pretty",
            Format::Compact => "compact",
            Format::Json => "json",
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

// Read once, on first use.
static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled (ignored for JSON)
    pub color: bool,
    /// Directory for the daily-rolled log file, if any
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            format: Format::Json,
            color: false,
            directory: None,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let debug = env_flag("COURIER_DEBUG").unwrap_or(false);

        let level = env::var("COURIER_LOG_LEVEL")
            .ok()
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = env::var("COURIER_LOG_FORMAT")
            .ok()
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = env_flag("COURIER_LOG_COLOR").unwrap_or_else(stderr_supports_color);

        let directory = env::var("COURIER_LOG_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Self {
            level,
            format,
            color,
            directory,
        }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Also write logs to a daily-rolled file in `directory`.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_directive()))
    }
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// Assume color unless explicitly disabled or not running under a terminal.
fn stderr_supports_color() -> bool {
    env::var("NO_COLOR").is_err() && env::var("TERM").is_ok()
}

/// Get the configuration read from the environment.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

// ============================================================================
// Subscriber installation
// ============================================================================

/// Keeps the background file writer alive; drop it only at process exit.
#[must_use = "dropping the guard stops the log file writer"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

type Filtered = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Filtered> + Send + Sync>;

/// Initialize logging from environment variables.
pub fn init() -> LogGuard {
    init_with(config())
}

/// Initialize logging with an explicit configuration.
///
/// Installing a second global subscriber is a no-op, so this is safe to call
/// from tests.
pub fn init_with(config: &LogConfig) -> LogGuard {
    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(config)];

    let file_guard = config.directory.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, "courier.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        guard
    });

    let _ = tracing_subscriber::registry()
        .with(config.filter())
        .with(layers)
        .try_init();

    LogGuard { _file: file_guard }
}

fn stderr_layer(config: &LogConfig) -> BoxedLayer {
    match config.format {
        Format::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        Format::Pretty => fmt::layer()
            .pretty()
            .with_ansi(config.color)
            .with_writer(std::io::stderr)
            .boxed(),
        Format::Compact => fmt::layer()
            .compact()
            .with_ansi(config.color)
            .with_writer(std::io::stderr)
            .boxed(),
    }
}

// ============================================================================
// Tests
// ============================================================================
