//! Request bodies sent to the update, stats and channel endpoints.

use serde::{Deserialize, Serialize};

/// Device and application identity attached to every request.
///
/// `version_name` is the version label of the bundle currently running; the
/// reporting client fills it in per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub platform: String,
    pub device_id: String,
    pub app_id: String,
    pub custom_id: String,
    pub version_build: String,
    pub version_code: String,
    pub version_os: String,
    pub version_name: String,
    pub plugin_version: String,
    pub is_emulator: bool,
    pub is_prod: bool,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            device_id: String::new(),
            app_id: String::new(),
            custom_id: String::new(),
            version_build: String::new(),
            version_code: String::new(),
            version_os: String::new(),
            version_name: String::new(),
            plugin_version: env!("CARGO_PKG_VERSION").to_string(),
            is_emulator: false,
            is_prod: true,
        }
    }
}

impl DeviceInfo {
    /// Copy of this identity labelled with the running bundle's version.
    pub fn for_version(&self, version_name: &str) -> Self {
        Self {
            version_name: version_name.to_string(),
            ..self.clone()
        }
    }
}

/// Body of a stats event.
#[derive(Debug, Clone, Serialize)]
pub struct StatsPayload {
    #[serde(flatten)]
    pub device: DeviceInfo,
    pub action: String,
}

/// Body of a set-channel request.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelPayload {
    #[serde(flatten)]
    pub device: DeviceInfo,
    pub channel: String,
}
