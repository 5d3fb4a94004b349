//! Shared setup for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use hotbundle::bundle::{BundleInfo, BundleStatus};
use hotbundle::config::ConfigFile;
use hotbundle::manager::{BundleManager, DownloadProgressCallback, UpdaterConfig};
use hotbundle::reporting::ResponseCallback;
use serde_json::{Map, Value};

use crate::error::CliError;

/// How long remote commands wait for a response.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    /// Bundle root given on the command line.
    pub root: Option<PathBuf>,
    /// Config file given on the command line.
    pub config_path: Option<PathBuf>,
}

impl GlobalArgs {
    /// Load the config file, honoring `--config`.
    pub fn load_config(&self) -> Result<ConfigFile, CliError> {
        let config = match self.config_path {
            Some(ref path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };
        Ok(config)
    }

    /// Bundle root: `--root` first, then the config file.
    pub fn resolve_root(&self, config: &ConfigFile) -> PathBuf {
        self.root.clone().unwrap_or_else(|| config.root_dir())
    }

    /// Manager configuration from the config file and command line.
    pub fn updater_config(&self) -> Result<UpdaterConfig, CliError> {
        let config = self.load_config()?;
        let mut updater = config.to_updater_config();
        updater.root_dir = self.resolve_root(&config);
        Ok(updater)
    }

    /// Open the bundle manager described by the command line and config.
    pub fn open_manager(
        &self,
        progress: Option<DownloadProgressCallback>,
    ) -> Result<BundleManager, CliError> {
        let mut builder = BundleManager::builder(self.updater_config()?);
        if let Some(progress) = progress {
            builder = builder.with_progress_callback(progress);
        }
        Ok(builder.build()?)
    }
}

/// Colored status label for terminal output.
pub fn status_label(status: BundleStatus) -> String {
    let label = status.as_str().to_uppercase();
    let styled = match status {
        BundleStatus::Success => console::style(label).green(),
        BundleStatus::Error => console::style(label).red(),
        BundleStatus::Pending => console::style(label).yellow(),
        BundleStatus::Downloading => console::style(label).cyan(),
        BundleStatus::Deleted => console::style(label).dim(),
    };
    styled.to_string()
}

/// One-line description of a bundle.
pub fn describe(info: &BundleInfo) -> String {
    let version = if info.version_name().is_empty() {
        "-"
    } else {
        info.version_name()
    };
    let created = info
        .timestamp
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    let checksum = if info.checksum.is_empty() {
        "-"
    } else {
        info.checksum.as_str()
    };

    format!(
        "{:<12} {:<12} {:<12} {:<20} {}",
        info.id,
        version,
        status_label(info.status),
        created,
        checksum
    )
}

/// Callback that forwards a remote response to the returned receiver.
pub fn response_channel() -> (ResponseCallback, mpsc::Receiver<Map<String, Value>>) {
    let (tx, rx) = mpsc::channel();
    let callback: ResponseCallback = Box::new(move |response| {
        let _ = tx.send(response);
    });
    (callback, rx)
}

/// Wait for a remote response and print it as JSON.
pub fn print_response(
    rx: mpsc::Receiver<Map<String, Value>>,
    what: &str,
) -> Result<(), CliError> {
    match rx.recv_timeout(RESPONSE_TIMEOUT) {
        Ok(response) => {
            let pretty = serde_json::to_string_pretty(&Value::Object(response))
                .map_err(|e| CliError::Rejected(e.to_string()))?;
            println!("{}", pretty);
            Ok(())
        }
        Err(_) => Err(CliError::Rejected(format!(
            "No {} response. Check the endpoint URLs in the config file and the log output.",
            what
        ))),
    }
}

/// Display a path relative to `base` when possible.
pub fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}
