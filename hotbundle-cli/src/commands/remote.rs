//! Update-check and channel commands.

use clap::Subcommand;
use hotbundle::manager::BundleManager;

use super::common::{print_response, response_channel, GlobalArgs};
use crate::error::CliError;

/// Channel subcommands.
#[derive(Debug, Subcommand)]
pub enum ChannelCommands {
    /// Show the update channel this device is assigned to
    Get,

    /// Assign this device to an update channel
    Set {
        /// Channel name
        name: String,
    },
}

/// Ask the update endpoint whether a newer bundle is available.
pub fn check(args: &GlobalArgs, url: Option<&str>) -> Result<(), CliError> {
    let mut updater = args.updater_config()?;
    if let Some(url) = url {
        updater.update_url = url.to_string();
    }
    if updater.update_url.is_empty() {
        return Err(CliError::Config(
            "No update URL. Pass one or set update_url in config.ini [updater] section."
                .to_string(),
        ));
    }

    let manager = BundleManager::open(updater)?;
    let (callback, rx) = response_channel();
    manager.check_for_update(None, callback);
    print_response(rx, "update check")
}

/// Run a channel subcommand.
pub fn channel(args: &GlobalArgs, command: ChannelCommands) -> Result<(), CliError> {
    let manager = args.open_manager(None)?;
    if manager.config().channel_url.is_empty() {
        return Err(CliError::Config(
            "No channel URL. Set channel_url in config.ini [updater] section.".to_string(),
        ));
    }

    let (callback, rx) = response_channel();
    match command {
        ChannelCommands::Get => manager.get_channel(callback),
        ChannelCommands::Set { ref name } => manager.set_channel(name, callback),
    }
    print_response(rx, "channel")
}
