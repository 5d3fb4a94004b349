//! CLI error type.

use hotbundle::config::ConfigFileError;
use hotbundle::logging::LoggingError;
use hotbundle::manager::BundleError;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigFileError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("{0}")]
    Rejected(String),
}

impl CliError {
    /// Print the error and exit with a non-zero status.
    pub fn exit(&self) -> ! {
        eprintln!("{} {}", console::style("Error:").red().bold(), self);
        std::process::exit(1);
    }
}
