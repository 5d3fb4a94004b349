//! Logging setup.
//!
//! Installs a global `tracing` subscriber writing human-readable lines to
//! stderr and, optionally, to a daily rolling file. The filter comes from
//! `RUST_LOG` when set, otherwise from the configured level.

use std::path::PathBuf;

use thiserror::Error;
pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;

/// Default log file prefix; files are named `hotbundle.log.YYYY-MM-DD`.
pub const LOG_FILE_PREFIX: &str = "hotbundle.log";

/// Errors from logging setup.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Logging options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rolling log files; `None` disables file output.
    pub directory: Option<PathBuf>,
    /// Log file name prefix.
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file_prefix: LOG_FILE_PREFIX.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Override the filter level.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

impl From<&LoggingSettings> for LoggingConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level.clone(),
            directory: settings.directory.clone(),
            ..Default::default()
        }
    }
}

/// Build the filter, preferring `env_override` over `level`.
fn build_filter(level: &str, env_override: Option<&str>) -> Result<EnvFilter, LoggingError> {
    let directive = env_override
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(level);

    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        filter: directive.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(&config.level, env.as_deref())?;

    let (file_layer, guard) = match config.directory {
        Some(ref dir) => {
            std::fs::create_dir_all(dir).map_err(|e| LoggingError::CreateDir {
                path: dir.clone(),
                source: e,
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_filter_uses_level_without_override() {
        let filter = build_filter("debug", None).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_filter_prefers_override() {
        let filter = build_filter("info", Some("trace")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));

        let filter = build_filter("warn", Some("  ")).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_invalid_filter() {
        let result = build_filter("hotbundle=notalevel", None);
        assert!(matches!(result, Err(LoggingError::InvalidFilter { .. })));
    }

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            level: "debug".to_string(),
            directory: Some(PathBuf::from("/var/log/hotbundle")),
        };
        let config = LoggingConfig::from(&settings);
        assert_eq!(config.level, "debug");
        assert_eq!(config.file_prefix, LOG_FILE_PREFIX);
        assert_eq!(config.directory, settings.directory);
    }

    #[test]
    fn test_init_logging_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs");
        let config = LoggingConfig {
            directory: Some(dir.clone()),
            ..Default::default()
        };

        // Another test may already own the global subscriber.
        match init_logging(&config) {
            Ok(guard) => assert!(guard.is_some()),
            Err(e) => assert!(matches!(e, LoggingError::AlreadyInitialized(_))),
        }
        assert!(dir.is_dir());
    }
}
