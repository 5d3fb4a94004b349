//! Addressable `section.key` configuration settings.

use std::path::PathBuf;
use std::str::FromStr;

use super::file::{expand_tilde, parse_bool, ConfigFile, ConfigFileError};

/// A single setting of [`ConfigFile`], addressed as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    StorageRootDir,
    StoragePreferencesFile,
    UpdaterUpdateUrl,
    UpdaterStatsUrl,
    UpdaterChannelUrl,
    UpdaterAutoDeletePrevious,
    UpdaterDownloadTimeoutSecs,
    DeviceAppId,
    DeviceDeviceId,
    DeviceCustomId,
    DeviceVersionBuild,
    DeviceVersionCode,
    DeviceVersionOs,
    DeviceIsEmulator,
    DeviceIsProd,
    LoggingLevel,
    LoggingDirectory,
}

const ALL_KEYS: [ConfigKey; 17] = [
    ConfigKey::StorageRootDir,
    ConfigKey::StoragePreferencesFile,
    ConfigKey::UpdaterUpdateUrl,
    ConfigKey::UpdaterStatsUrl,
    ConfigKey::UpdaterChannelUrl,
    ConfigKey::UpdaterAutoDeletePrevious,
    ConfigKey::UpdaterDownloadTimeoutSecs,
    ConfigKey::DeviceAppId,
    ConfigKey::DeviceDeviceId,
    ConfigKey::DeviceCustomId,
    ConfigKey::DeviceVersionBuild,
    ConfigKey::DeviceVersionCode,
    ConfigKey::DeviceVersionOs,
    ConfigKey::DeviceIsEmulator,
    ConfigKey::DeviceIsProd,
    ConfigKey::LoggingLevel,
    ConfigKey::LoggingDirectory,
];

fn optional_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| expand_tilde(value))
}

fn path_string(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &ALL_KEYS
    }

    /// Section name.
    pub fn section(&self) -> &'static str {
        match self {
            Self::StorageRootDir | Self::StoragePreferencesFile => "storage",
            Self::UpdaterUpdateUrl
            | Self::UpdaterStatsUrl
            | Self::UpdaterChannelUrl
            | Self::UpdaterAutoDeletePrevious
            | Self::UpdaterDownloadTimeoutSecs => "updater",
            Self::DeviceAppId
            | Self::DeviceDeviceId
            | Self::DeviceCustomId
            | Self::DeviceVersionBuild
            | Self::DeviceVersionCode
            | Self::DeviceVersionOs
            | Self::DeviceIsEmulator
            | Self::DeviceIsProd => "device",
            Self::LoggingLevel | Self::LoggingDirectory => "logging",
        }
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        match self {
            Self::StorageRootDir => "root_dir",
            Self::StoragePreferencesFile => "preferences_file",
            Self::UpdaterUpdateUrl => "update_url",
            Self::UpdaterStatsUrl => "stats_url",
            Self::UpdaterChannelUrl => "channel_url",
            Self::UpdaterAutoDeletePrevious => "auto_delete_previous",
            Self::UpdaterDownloadTimeoutSecs => "download_timeout_secs",
            Self::DeviceAppId => "app_id",
            Self::DeviceDeviceId => "device_id",
            Self::DeviceCustomId => "custom_id",
            Self::DeviceVersionBuild => "version_build",
            Self::DeviceVersionCode => "version_code",
            Self::DeviceVersionOs => "version_os",
            Self::DeviceIsEmulator => "is_emulator",
            Self::DeviceIsProd => "is_prod",
            Self::LoggingLevel => "level",
            Self::LoggingDirectory => "directory",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string; unset values are empty.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            Self::StorageRootDir => path_string(&config.storage.root_dir),
            Self::StoragePreferencesFile => path_string(&config.storage.preferences_file),
            Self::UpdaterUpdateUrl => config.updater.update_url.clone(),
            Self::UpdaterStatsUrl => config.updater.stats_url.clone(),
            Self::UpdaterChannelUrl => config.updater.channel_url.clone(),
            Self::UpdaterAutoDeletePrevious => config.updater.auto_delete_previous.to_string(),
            Self::UpdaterDownloadTimeoutSecs => config.updater.download_timeout_secs.to_string(),
            Self::DeviceAppId => config.device.app_id.clone(),
            Self::DeviceDeviceId => config.device.device_id.clone(),
            Self::DeviceCustomId => config.device.custom_id.clone(),
            Self::DeviceVersionBuild => config.device.version_build.clone(),
            Self::DeviceVersionCode => config.device.version_code.clone(),
            Self::DeviceVersionOs => config.device.version_os.clone(),
            Self::DeviceIsEmulator => config.device.is_emulator.to_string(),
            Self::DeviceIsProd => config.device.is_prod.to_string(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingDirectory => path_string(&config.logging.directory),
        }
    }

    /// Parse `value` and store it.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigFileError> {
        let name = self.name();
        let text = value.trim().to_string();

        match self {
            Self::StorageRootDir => config.storage.root_dir = optional_path(value),
            Self::StoragePreferencesFile => {
                config.storage.preferences_file = optional_path(value)
            }
            Self::UpdaterUpdateUrl => config.updater.update_url = text,
            Self::UpdaterStatsUrl => config.updater.stats_url = text,
            Self::UpdaterChannelUrl => config.updater.channel_url = text,
            Self::UpdaterAutoDeletePrevious => {
                config.updater.auto_delete_previous = parse_bool(&name, value)?
            }
            Self::UpdaterDownloadTimeoutSecs => {
                config.updater.download_timeout_secs = match text.parse::<u64>() {
                    Ok(secs) if secs > 0 => secs,
                    _ => {
                        return Err(ConfigFileError::InvalidValue {
                            key: name,
                            value: value.to_string(),
                            reason: "expected a positive number of seconds".to_string(),
                        })
                    }
                }
            }
            Self::DeviceAppId => config.device.app_id = text,
            Self::DeviceDeviceId => config.device.device_id = text,
            Self::DeviceCustomId => config.device.custom_id = text,
            Self::DeviceVersionBuild => config.device.version_build = text,
            Self::DeviceVersionCode => config.device.version_code = text,
            Self::DeviceVersionOs => config.device.version_os = text,
            Self::DeviceIsEmulator => config.device.is_emulator = parse_bool(&name, value)?,
            Self::DeviceIsProd => config.device.is_prod = parse_bool(&name, value)?,
            Self::LoggingLevel => {
                if text.is_empty() {
                    return Err(ConfigFileError::InvalidValue {
                        key: name,
                        value: value.to_string(),
                        reason: "log level cannot be empty".to_string(),
                    });
                }
                config.logging.level = text
            }
            Self::LoggingDirectory => config.logging.directory = optional_path(value),
        }

        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigFileError::UnknownKey(s.to_string()))
    }
}
