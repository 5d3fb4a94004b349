//! Configuration file support.
//!
//! Settings live in an INI file, by default at
//! `<config dir>/hotbundle/config.ini`:
//!
//! ```ini
//! [storage]
//! root_dir = ~/.local/share/hotbundle
//!
//! [updater]
//! update_url = https://updates.example.com/latest
//! stats_url = https://updates.example.com/stats
//! channel_url = https://updates.example.com/channel
//! auto_delete_previous = true
//!
//! [device]
//! app_id = com.example.app
//! device_id = 6f1c2a
//!
//! [logging]
//! level = info
//! ```
//!
//! A missing file yields defaults. [`ConfigKey`] addresses individual
//! settings as `section.key` for the `config get/set/list` commands.

mod file;
mod keys;

pub use file::{
    config_file_path, default_root_dir, ConfigFile, ConfigFileError, DeviceSettings,
    LoggingSettings, StorageSettings, UpdaterSettings, APP_DIR, CONFIG_FILE,
};
pub use keys::ConfigKey;
