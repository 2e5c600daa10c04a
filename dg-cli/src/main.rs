//! DoorGuard CLI - command-line control surface for a DoorGuard door controller.
//!
//! Drives the device over its WebSocket session: door control, user
//! enrollment, access history, camera capture and maintenance. Useful for
//! headless operation, scripting and debugging the device.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use dg_core::config::{AppConfig, ConfigHandle};
use dg_core::error::DgResult;
use dg_core::logging;

/// DoorGuard - face-recognition door lock client.
#[derive(Parser)]
#[command(
    name = "doorguard",
    version,
    about = "DoorGuard door controller CLI",
    long_about = "A command-line interface for the DoorGuard door controller.\n\
                   Connects to the device's WebSocket server to unlock the door, manage\n\
                   enrolled users and watch live events."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the device and stream its events until Ctrl+C.
    #[command(alias = "connect")]
    Listen {
        /// Device address (overrides config).
        #[arg(short, long)]
        address: Option<String>,
        /// Save the address to the config file once connected.
        #[arg(long)]
        save: bool,
        /// Also print camera frames (noisy).
        #[arg(long)]
        frames: bool,
        /// Only print lock changes (and connection status).
        #[arg(long, conflicts_with = "frames")]
        doors: bool,
        /// Also print replies to requests, not just device pushes.
        #[arg(long)]
        all: bool,
    },
    /// Show the connection, door and device status.
    Status,
    /// Unlock the door.
    Unlock {
        /// Seconds to stay unlocked (device default when omitted).
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Lock the door now.
    Lock,
    /// List and manage enrolled users.
    Users {
        #[command(subcommand)]
        action: commands::users::UsersAction,
    },
    /// Show the device's access history.
    History {
        /// Only show denied recognitions.
        #[arg(long)]
        denied: bool,
        /// Number of most recent records to show.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Take a photo with the device camera.
    Capture {
        /// Where to write the JPEG.
        #[arg(short, long, default_value = "capture.jpg")]
        output: PathBuf,
    },
    /// Change device settings.
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Device maintenance (reboot, reset, ping).
    System {
        #[command(subcommand)]
        action: commands::system::SystemAction,
    },
    /// Show or change the saved device address.
    Address {
        #[command(subcommand)]
        action: commands::address::AddressAction,
    },
}

#[tokio::main]
async fn main() -> DgResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_deref().map(PathBuf::from);
    let config = match &config_path {
        Some(path) if path.exists() => AppConfig::load_from_file(path)?,
        Some(_) => AppConfig::default(),
        None => AppConfig::load_default()?,
    };

    // Initialize logging
    let log_dir = config
        .effective_log_dir()
        .unwrap_or_else(|_| PathBuf::from("logs"));
    let _guard = logging::init_logging(&config.logging, &log_dir, cli.verbose)?;

    let config_handle = match config_path {
        Some(path) => ConfigHandle::with_path(config, path),
        None => ConfigHandle::new(config),
    };

    info!("DoorGuard CLI v{}", dg_core::constants::APP_VERSION);

    // Dispatch to command handlers
    match cli.command {
        Commands::Listen { address, save, frames, doors, all } => {
            let filter = commands::listen::EventFilter { frames, doors, all };
            commands::listen::run(config_handle, address, save, filter, cli.format).await
        }
        Commands::Status => commands::status::run(config_handle, cli.format).await,
        Commands::Unlock { duration } => {
            commands::door::unlock(config_handle, duration, cli.format).await
        }
        Commands::Lock => commands::door::lock(config_handle, cli.format).await,
        Commands::Users { action } => {
            commands::users::run(config_handle, action, cli.format).await
        }
        Commands::History { denied, limit } => {
            commands::history::run(config_handle, denied, limit, cli.format).await
        }
        Commands::Capture { output } => {
            commands::capture::run(config_handle, output, cli.format).await
        }
        Commands::Settings { action } => {
            commands::settings::run(config_handle, action, cli.format).await
        }
        Commands::System { action } => {
            commands::system::run(config_handle, action, cli.format).await
        }
        Commands::Address { action } => {
            commands::address::run(config_handle, action, cli.format).await
        }
    }
}
