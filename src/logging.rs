// Logging system for file-variants
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;
use crate::error::Result;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format (pretty for terminals, json for programmatic use)
    pub format: LogFormat,
    /// Whether to show targets (module names)
    pub show_targets: bool,
}

/// Log output format options
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Pretty output for terminals
    Pretty,
    /// JSON output for programmatic use
    Json,
    /// Compact format for structured logging
    Compact,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            show_targets: false,
        }
    }
}

impl LogConfig {
    /// Create logging configuration from the host configuration's logging section
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        let level = settings
            .level
            .as_deref()
            .and_then(|value| Level::from_str(value).ok())
            .unwrap_or(Level::INFO);

        let format = match settings.format.as_deref() {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            Some("pretty") | None => LogFormat::Pretty,
            _ => LogFormat::Pretty,
        };

        Self {
            level,
            format,
            show_targets: settings.show_targets.unwrap_or(false),
        }
    }
}

/// Initialize the logging system with the given configuration
pub fn init_logging(config: LogConfig) -> Result<()> {
    let env_filter = EnvFilter::new(format!("file_variants={}", config.level));

    match config.format {
        LogFormat::Pretty => init_pretty_logging(config, env_filter),
        LogFormat::Json => init_json_logging(config, env_filter),
        LogFormat::Compact => init_compact_logging(config, env_filter),
    }?;

    Ok(())
}

fn init_pretty_logging(config: LogConfig, env_filter: EnvFilter) -> Result<()> {
    fmt()
        .with_env_filter(env_filter)
        .with_target(config.show_targets)
        .init();

    Ok(())
}

fn init_json_logging(_config: LogConfig, env_filter: EnvFilter) -> Result<()> {
    fmt().with_env_filter(env_filter).json().init();

    Ok(())
}

fn init_compact_logging(config: LogConfig, env_filter: EnvFilter) -> Result<()> {
    fmt()
        .with_env_filter(env_filter)
        .compact()
        .with_target(config.show_targets)
        .init();

    Ok(())
}

/// Logging utilities for common operations
pub mod utils {
    use tracing::{span, Level, Span};

    /// Create a span for structural command processing
    pub fn command_span(command: &str, table: &str) -> Span {
        span!(Level::DEBUG, "command_processing", command = %command, table = %table)
    }

    /// Create a span for datamap field adjustment
    pub fn datamap_span(table: &str) -> Span {
        span!(Level::DEBUG, "field_adjustment", table = %table)
    }
}
