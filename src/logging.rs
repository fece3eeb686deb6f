//! Structured logging initialization.
//!
//! Test suites usually rely on the default (no subscriber), but a suite
//! debugging its own mock setup can call [`init_logging`] to see the
//! environment's registration and routing decisions.

use anyhow::Result;
use std::collections::BTreeMap;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::writer::BoxMakeWriter, util::SubscriberInitExt,
};

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-friendly, pretty-printed logs.
    Pretty,
    /// JSON-formatted logs for machine parsing.
    Json,
    /// Compact single-line logs.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Configuration for logging initialization.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level (trace, debug, info, warn, error, off).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Per-target log level overrides.
    pub targets: BTreeMap<String, String>,
    /// Include target in log output.
    pub with_target: bool,
    /// Write logs to stderr instead of stdout.
    pub use_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            targets: BTreeMap::new(),
            with_target: true,
            use_stderr: true,
        }
    }
}

impl LogConfig {
    /// Build a logging configuration from environment variables.
    ///
    /// Supported environment variables:
    /// - SSHMOCK_LOG_LEVEL
    /// - SSHMOCK_LOG_FORMAT (pretty|json|compact)
    /// - SSHMOCK_LOG_TARGETS (comma-separated target=level list)
    pub fn from_env(default_level: &str) -> Self {
        let mut config = Self {
            level: std::env::var("SSHMOCK_LOG_LEVEL").unwrap_or_else(|_| default_level.to_string()),
            ..Self::default()
        };

        if let Ok(format) = std::env::var("SSHMOCK_LOG_FORMAT")
            && let Some(parsed) = LogFormat::parse(&format)
        {
            config.format = parsed;
        }

        if let Ok(targets) = std::env::var("SSHMOCK_LOG_TARGETS") {
            config.targets = parse_target_overrides(&targets);
        }

        config
    }

    /// Override the base log level.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Build the effective EnvFilter, honoring RUST_LOG if set.
    pub fn env_filter(&self) -> EnvFilter {
        if std::env::var_os("RUST_LOG").is_some()
            && let Ok(filter) = EnvFilter::try_from_default_env()
        {
            return filter;
        }

        let mut filter = self.level.clone();
        for (target, level) in &self.targets {
            filter.push_str(&format!(",{}={}", target, level));
        }
        EnvFilter::new(filter)
    }
}

/// Initialize tracing-based logging for the current process.
///
/// Safe to call more than once; a second call against an already-installed
/// subscriber is a no-op.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = config.env_filter();
    let writer = if config.use_stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };
    let builder = fmt::Subscriber::builder()
        .with_target(config.with_target)
        .with_env_filter(filter)
        .with_writer(writer);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().finish().try_init(),
        LogFormat::Json => builder.with_ansi(false).json().finish().try_init(),
        LogFormat::Compact => builder.compact().finish().try_init(),
    };

    if let Err(err) = result {
        if err.to_string().contains("already initialized") {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn parse_target_overrides(value: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((target, level)) = entry.split_once('=') else {
            continue;
        };
        let target = target.trim();
        let level = level.trim().to_lowercase();
        if target.is_empty() || !is_valid_level(&level) {
            continue;
        }
        map.insert(target.to_string(), level);
    }
    map
}

fn is_valid_level(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error" | "off")
}
