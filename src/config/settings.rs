//! # Observability Settings
//!
//! Logging configuration read from the environment.

use std::fmt;

/// Log levels accepted through `LOG_LEVEL`
const SUPPORTED_LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable single-line output
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Observability configuration for structured logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    pub log_level: String,

    /// Output format
    pub log_format: LogFormat,

    /// A `LOG_LEVEL` value that was rejected in favour of the default, reported
    /// once logging is up
    pub rejected_log_level: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            rejected_log_level: None,
        }
    }
}

impl ObservabilityConfig {
    /// Load observability configuration from environment variables.
    ///
    /// - `LOG_LEVEL`: one of `debug`, `info`, `warn`, `error` (default: `info`)
    /// - `LOG_FORMAT`: `json` for JSON output, anything else for text
    pub fn from_env() -> Self {
        Self::from_values(std::env::var("LOG_LEVEL").ok(), std::env::var("LOG_FORMAT").ok())
    }

    fn from_values(log_level: Option<String>, log_format: Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(level) = log_level.map(|l| l.trim().to_lowercase()).filter(|l| !l.is_empty()) {
            if SUPPORTED_LOG_LEVELS.contains(&level.as_str()) {
                config.log_level = level;
            } else {
                config.rejected_log_level = Some(level);
            }
        }

        if log_format.is_some_and(|f| f.eq_ignore_ascii_case("json")) {
            config.log_format = LogFormat::Json;
        }

        config
    }
}
