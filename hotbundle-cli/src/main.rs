//! hotbundle CLI - manage over-the-air web bundles from the command line.
//!
//! Every command opens the bundle root, performs one lifecycle operation and
//! exits. State lives in the root's preferences file, so a sequence of
//! invocations behaves like one long-running host application.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hotbundle::logging::{init_logging, LoggingConfig, WorkerGuard};
use tracing::debug;

use commands::common::GlobalArgs;
use commands::config::ConfigCommands;
use commands::remote::ChannelCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "hotbundle")]
#[command(version, about = "Over-the-air web bundle updates", long_about = None)]
struct Cli {
    /// Bundle root directory (overrides storage.root_dir)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a bundle archive and register it as pending
    Download {
        /// Archive URL
        url: String,

        /// Human-readable version name
        #[arg(long)]
        version_name: Option<String>,
    },

    /// List installed bundles
    List,

    /// Show the active, fallback and next bundles
    Current,

    /// Activate a bundle (use "builtin" to reset)
    Set {
        /// Bundle id
        id: String,
    },

    /// Confirm that a bundle works and make it the fallback
    Success {
        /// Bundle id
        id: String,

        /// Delete the previous fallback bundle
        #[arg(long)]
        auto_delete: bool,
    },

    /// Mark a bundle as failing
    Error {
        /// Bundle id
        id: String,
    },

    /// Delete a bundle
    Delete {
        /// Bundle id
        id: String,

        /// Keep the metadata record and mark it deleted
        #[arg(long)]
        keep_info: bool,
    },

    /// Return to the builtin bundle
    Reset,

    /// Show, stage or clear the bundle used at next start
    Next {
        /// Bundle id to stage
        id: Option<String>,

        /// Clear the staged bundle
        #[arg(long, conflicts_with = "id")]
        clear: bool,
    },

    /// Show the fallback bundle
    Fallback,

    /// Change a bundle's version name (empty clears it)
    Rename {
        /// Bundle id
        id: String,

        /// New version name
        name: String,
    },

    /// Ask the update endpoint for a newer bundle
    Check {
        /// Update endpoint (overrides updater.update_url)
        url: Option<String>,
    },

    /// Get or set the update channel
    Channel {
        #[command(subcommand)]
        command: ChannelCommands,
    },

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    let args = GlobalArgs {
        root: cli.root,
        config_path: cli.config,
    };

    let _guard = match setup_logging(&args, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => e.exit(),
    };

    debug!(root = ?args.root, config = ?args.config_path, "hotbundle starting");

    if let Err(e) = run(&args, cli.command) {
        e.exit();
    }
}

fn setup_logging(
    args: &GlobalArgs,
    verbose: bool,
) -> Result<Option<WorkerGuard>, CliError> {
    let config = args.load_config()?;
    let mut logging = LoggingConfig::from(&config.logging);
    if verbose {
        logging = logging.with_level("debug");
    }
    Ok(init_logging(&logging)?)
}

fn run(args: &GlobalArgs, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Download { url, version_name } => {
            commands::bundles::download(args, &url, version_name.as_deref())
        }
        Commands::List => commands::bundles::list(args),
        Commands::Current => commands::bundles::current(args),
        Commands::Set { id } => commands::bundles::set(args, &id),
        Commands::Success { id, auto_delete } => commands::bundles::success(args, &id, auto_delete),
        Commands::Error { id } => commands::bundles::error(args, &id),
        Commands::Delete { id, keep_info } => commands::bundles::delete(args, &id, keep_info),
        Commands::Reset => commands::bundles::reset(args),
        Commands::Next { id, clear } => commands::bundles::next(args, id.as_deref(), clear),
        Commands::Fallback => commands::bundles::fallback(args),
        Commands::Rename { id, name } => commands::bundles::rename(args, &id, &name),
        Commands::Check { url } => commands::remote::check(args, url.as_deref()),
        Commands::Channel { command } => commands::remote::channel(args, command),
        Commands::Config { command } => commands::config::run(args, command),
    }
}
