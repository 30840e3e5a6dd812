//! HiveWatch CLI - terminal host for the live connection.
//!
//! Stands in for the mobile screens: it keeps a supervised connection to the
//! analysis backend, prints what arrives, streams image files as camera
//! frames and lists the historical endpoints.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use hw_core::config::{AppConfig, ConfigHandle};
use hw_core::error::HwResult;
use hw_core::logging;
use hw_core::platform::Platform;

/// HiveWatch - hive monitoring client.
#[derive(Parser)]
#[command(
    name = "hivewatch",
    version,
    about = "HiveWatch monitoring client CLI",
    long_about = "A command-line client for the HiveWatch analysis backend.\n\
                  Streams camera frames and receives detections and insights over a live connection."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

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
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and print live events until stopped.
    ///
    /// Reads control commands from stdin: background, foreground, refresh,
    /// retry, status, quit.
    Watch {
        /// Live socket URL (overrides config).
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Stream image files to the backend as camera frames.
    Stream {
        /// Image files to send, in order.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Interval between frames in milliseconds (overrides config).
        #[arg(short, long)]
        interval: Option<u64>,
        /// Start over after the last file instead of stopping.
        #[arg(short, long)]
        repeat: bool,
        /// Device id stamped on frames (overrides config).
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List historical events.
    Events {
        /// Number of events to show.
        #[arg(short = 'n', long, default_value = "25")]
        limit: usize,
    },
    /// List historical insights.
    Insights {
        /// Number of insights to show.
        #[arg(short = 'n', long, default_value = "25")]
        limit: usize,
    },
    /// List news articles.
    News {
        /// Number of articles to show.
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
    /// View and manage the configuration file.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> HwResult<()> {
    let cli = Cli::parse();

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => AppConfig::default_config_path()?,
    };
    let mut config = if config_path.exists() {
        AppConfig::load_from_file(&config_path)?
    } else {
        AppConfig::default()
    };
    config.apply_env_overrides();
    if cli.verbose {
        config.logging.level = "debug".into();
    }

    // Initialize logging
    let _guard = match config.effective_log_dir() {
        Ok(dir) => Some(logging::init_logging(&config.logging, &dir)?),
        Err(_) => {
            logging::init_console_logging(&config.logging.level);
            None
        }
    };

    info!(
        "HiveWatch CLI v{} on {}",
        hw_core::constants::APP_VERSION,
        Platform::current()
    );

    match cli.command {
        // Config management works on files that fail validation too.
        Commands::Config { action } => {
            commands::config::run(config, &config_path, action, cli.format).await
        }
        command => {
            config.validate()?;
            dispatch(command, ConfigHandle::new(config), cli.format).await
        }
    }
}

async fn dispatch(command: Commands, config: ConfigHandle, format: OutputFormat) -> HwResult<()> {
    match command {
        Commands::Watch { url } => commands::watch::run(config, url, format).await,
        Commands::Stream {
            files,
            interval,
            repeat,
            device,
        } => commands::stream::run(config, files, interval, repeat, device).await,
        Commands::Events { limit } => commands::history::events(config, limit, format).await,
        Commands::Insights { limit } => commands::history::insights(config, limit, format).await,
        Commands::News { limit } => commands::history::news(config, limit, format).await,
        Commands::Config { .. } => Ok(()),
    }
}
