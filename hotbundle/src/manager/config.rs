//! Configuration for the bundle manager.

use std::path::PathBuf;
use std::time::Duration;

use crate::reporting::{DeviceInfo, ReportingConfig, DEFAULT_REPORTING_TIMEOUT_SECS};

use super::download::DEFAULT_TIMEOUT_SECS;

/// Directory under the root holding one subdirectory per bundle.
pub const VERSIONS_DIR: &str = "versions";

/// Default metadata file name under the root.
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Configuration for the bundle manager.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Writable root holding `versions/`, scratch files and metadata.
    pub root_dir: PathBuf,

    /// Metadata file. Defaults to `<root>/preferences.json`.
    pub preferences_file: Option<PathBuf>,

    /// Stats endpoint. Empty disables stats.
    pub stats_url: String,

    /// Channel endpoint. Empty disables channel calls.
    pub channel_url: String,

    /// Default update-check endpoint.
    pub update_url: String,

    /// Device identity sent with reports.
    pub device: DeviceInfo,

    /// Archive download timeout.
    pub download_timeout: Duration,

    /// Reporting request timeout.
    pub reporting_timeout: Duration,

    /// Delete the previous fallback bundle when a new bundle is confirmed.
    pub auto_delete_previous: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            preferences_file: None,
            stats_url: String::new(),
            channel_url: String::new(),
            update_url: String::new(),
            device: DeviceInfo::default(),
            download_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            reporting_timeout: Duration::from_secs(DEFAULT_REPORTING_TIMEOUT_SECS),
            auto_delete_previous: true,
        }
    }
}

impl UpdaterConfig {
    /// Create a new configuration rooted at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Set the metadata file.
    pub fn with_preferences_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.preferences_file = Some(path.into());
        self
    }

    /// Set the stats endpoint.
    pub fn with_stats_url(mut self, url: impl Into<String>) -> Self {
        self.stats_url = url.into();
        self
    }

    /// Set the channel endpoint.
    pub fn with_channel_url(mut self, url: impl Into<String>) -> Self {
        self.channel_url = url.into();
        self
    }

    /// Set the update-check endpoint.
    pub fn with_update_url(mut self, url: impl Into<String>) -> Self {
        self.update_url = url.into();
        self
    }

    /// Set the device identity.
    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    /// Set the archive download timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set the reporting request timeout.
    pub fn with_reporting_timeout(mut self, timeout: Duration) -> Self {
        self.reporting_timeout = timeout;
        self
    }

    /// Enable or disable deleting the previous bundle on confirmation.
    pub fn with_auto_delete_previous(mut self, enabled: bool) -> Self {
        self.auto_delete_previous = enabled;
        self
    }

    /// Directory holding installed bundles.
    pub fn versions_dir(&self) -> PathBuf {
        self.root_dir.join(VERSIONS_DIR)
    }

    /// Resolved metadata file path.
    pub fn preferences_path(&self) -> PathBuf {
        self.preferences_file
            .clone()
            .unwrap_or_else(|| self.root_dir.join(PREFERENCES_FILE))
    }

    /// Check whether any reporting endpoint is configured.
    pub fn has_reporting(&self) -> bool {
        !self.stats_url.is_empty() || !self.channel_url.is_empty() || !self.update_url.is_empty()
    }

    /// Reporting client settings derived from this configuration.
    pub fn reporting_config(&self) -> ReportingConfig {
        ReportingConfig {
            stats_url: self.stats_url.clone(),
            channel_url: self.channel_url.clone(),
            device: self.device.clone(),
            timeout: self.reporting_timeout,
        }
    }
}
