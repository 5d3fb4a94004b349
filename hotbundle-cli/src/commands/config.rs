//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, and `config path`
//! for the INI file that seeds the bundle manager.

use std::path::PathBuf;

use clap::Subcommand;
use hotbundle::config::{config_file_path, ConfigFile, ConfigKey};

use super::common::GlobalArgs;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., updater.stats_url)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., device.app_id)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(args: &GlobalArgs, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(args, &key),
        ConfigCommands::Set { key, value } => run_set(args, &key, &value),
        ConfigCommands::List => run_list(args),
        ConfigCommands::Path => run_path(args),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'hotbundle config list' to see available keys.",
            key
        ))
    })
}

fn target_path(args: &GlobalArgs) -> PathBuf {
    args.config_path.clone().unwrap_or_else(config_file_path)
}

/// Get a configuration value.
fn run_get(args: &GlobalArgs, key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = args.load_config()?;
    let value = config_key.get(&config);

    if value.is_empty() {
        println!("(not set)");
    } else {
        println!("{}", value);
    }

    Ok(())
}

/// Set a configuration value.
fn run_set(args: &GlobalArgs, key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;

    let mut config = args.load_config()?;
    config_key
        .set(&mut config, value)
        .map_err(|e| CliError::Config(e.to_string()))?;
    config.save_to(&target_path(args))?;

    println!("Set {} = {}", config_key.name(), value);

    Ok(())
}

/// List all configuration settings.
fn run_list(args: &GlobalArgs) -> Result<(), CliError> {
    let config = args.load_config()?;

    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();

        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        let value = key.get(&config);
        let key_name = key.key_name();

        if value.is_empty() {
            println!("  {} = (not set)", key_name);
        } else {
            println!("  {} = {}", key_name, value);
        }
    }

    Ok(())
}

/// Show the configuration file path.
fn run_path(args: &GlobalArgs) -> Result<(), CliError> {
    println!("{}", target_path(args).display());
    Ok(())
}
