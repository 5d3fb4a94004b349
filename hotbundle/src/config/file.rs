//! INI configuration file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::manager::UpdaterConfig;
use crate::reporting::DeviceInfo;

/// Application directory name under the platform config and data dirs.
pub const APP_DIR: &str = "hotbundle";

/// Configuration file name.
pub const CONFIG_FILE: &str = "config.ini";

/// Errors from loading, saving or editing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read config {}: {source}", path.display())]
    Read { path: PathBuf, source: ini::Error },

    #[error("failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Default location of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

/// Default bundle root when none is configured.
pub fn default_root_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSettings {
    pub root_dir: Option<PathBuf>,
    pub preferences_file: Option<PathBuf>,
}

/// `[updater]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterSettings {
    pub update_url: String,
    pub stats_url: String,
    pub channel_url: String,
    pub auto_delete_previous: bool,
    pub download_timeout_secs: u64,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        let defaults = UpdaterConfig::default();
        Self {
            update_url: defaults.update_url,
            stats_url: defaults.stats_url,
            channel_url: defaults.channel_url,
            auto_delete_previous: defaults.auto_delete_previous,
            download_timeout_secs: defaults.download_timeout.as_secs(),
        }
    }
}

/// `[device]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub app_id: String,
    pub device_id: String,
    pub custom_id: String,
    pub version_build: String,
    pub version_code: String,
    pub version_os: String,
    pub is_emulator: bool,
    pub is_prod: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        let device = DeviceInfo::default();
        Self {
            app_id: device.app_id,
            device_id: device.device_id,
            custom_id: device.custom_id,
            version_build: device.version_build,
            version_code: device.version_code,
            version_os: device.version_os,
            is_emulator: device.is_emulator,
            is_prod: device.is_prod,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `hotbundle=debug`.
    pub level: String,
    /// Directory for rolling log files. Unset logs to stderr only.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Parsed `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub storage: StorageSettings,
    pub updater: UpdaterSettings,
    pub device: DeviceSettings,
    pub logging: LoggingSettings,
}

fn get_string(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.section(Some(section))
        .and_then(|s| s.get(key))
        .map(|v| v.trim().to_string())
}

/// Parse a boolean the way INI files usually spell them.
pub(crate) fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigFileError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

/// Replace a leading `~` with the home directory.
pub(crate) fn expand_tilde(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(value)),
        None => PathBuf::from(value),
    }
}

impl ConfigFile {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`; a missing file yields defaults.
    ///
    /// Unparseable values are an error rather than silently defaulted.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigFileError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut config = Self::default();
        for key in super::ConfigKey::all() {
            if let Some(value) = get_string(&ini, key.section(), key.key_name()) {
                key.set(&mut config, &value)?;
            }
        }

        debug!(path = %path.display(), "Config file loaded");
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        let write_err = |e: std::io::Error| ConfigFileError::Write {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut ini = Ini::new();
        for key in super::ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini.write_to_file(path).map_err(write_err)?;

        debug!(path = %path.display(), "Config file saved");
        Ok(())
    }

    /// Bundle root, falling back to the platform data directory.
    pub fn root_dir(&self) -> PathBuf {
        self.storage.root_dir.clone().unwrap_or_else(default_root_dir)
    }

    /// Device identity for reports.
    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            app_id: self.device.app_id.clone(),
            device_id: self.device.device_id.clone(),
            custom_id: self.device.custom_id.clone(),
            version_build: self.device.version_build.clone(),
            version_code: self.device.version_code.clone(),
            version_os: self.device.version_os.clone(),
            is_emulator: self.device.is_emulator,
            is_prod: self.device.is_prod,
            ..DeviceInfo::default()
        }
    }

    /// Manager configuration described by this file.
    pub fn to_updater_config(&self) -> UpdaterConfig {
        let mut config = UpdaterConfig::new(self.root_dir())
            .with_update_url(&self.updater.update_url)
            .with_stats_url(&self.updater.stats_url)
            .with_channel_url(&self.updater.channel_url)
            .with_auto_delete_previous(self.updater.auto_delete_previous)
            .with_download_timeout(Duration::from_secs(self.updater.download_timeout_secs))
            .with_device(self.device_info());

        if let Some(ref prefs) = self.storage.preferences_file {
            config = config.with_preferences_file(prefs);
        }
        config
    }
}
