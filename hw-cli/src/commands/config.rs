//! Config commands.

use std::path::Path;

use clap::Subcommand;
use console::style;

use hw_core::config::{AppConfig, BackoffKind, ValidationMode};
use hw_core::error::{HwError, HwResult};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration (file plus environment overrides).
    Show,
    /// Print the configuration file path.
    Path,
    /// Write a configuration file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Get a setting by key path.
    Get {
        /// Setting key path (e.g., "backend.socket_url", "connection.max_attempts").
        key: String,
    },
    /// Set a setting by key path and save the file.
    Set {
        /// Setting key path.
        key: String,
        /// New value.
        value: String,
    },
    /// Validate the effective configuration.
    Check,
}

/// Resolve a dot-separated key path to a value from the config.
fn get_setting_value(cfg: &AppConfig, key: &str) -> Option<String> {
    let value = match key {
        "backend.socket_url" => cfg.backend.socket_url.clone(),
        "backend.api_base" => cfg.backend.api_base.clone(),
        "backend.request_timeout_ms" => cfg.backend.request_timeout_ms.to_string(),
        "connection.max_attempts" => cfg.connection.max_attempts.to_string(),
        "connection.retry_delay_ms" => cfg.connection.retry_delay_ms.to_string(),
        "connection.connect_timeout_ms" => cfg.connection.connect_timeout_ms.to_string(),
        "connection.backoff" => backoff_name(cfg.connection.backoff).to_string(),
        "connection.max_retry_delay_ms" => cfg.connection.max_retry_delay_ms.to_string(),
        "connection.jitter_factor" => cfg.connection.jitter_factor.to_string(),
        "connection.bucket_capacity" => cfg.connection.bucket_capacity.to_string(),
        "connection.validation" => validation_name(cfg.connection.validation).to_string(),
        "device.device_id" => cfg.device.device_id.clone(),
        "device.frame_interval_ms" => cfg.device.frame_interval_ms.to_string(),
        "logging.level" => cfg.logging.level.clone(),
        "logging.directory" => cfg.logging.directory.clone(),
        "logging.json_output" => cfg.logging.json_output.to_string(),
        _ => return None,
    };
    Some(value)
}

/// Apply a value to a dot-separated key path on the config.
fn set_setting_value(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), String> {
    fn number<T: std::str::FromStr>(value: &str) -> Result<T, String> {
        value.trim().parse().map_err(|_| format!("expected a number, got {value:?}"))
    }

    match key {
        "backend.socket_url" => cfg.backend.socket_url = value.trim().to_string(),
        "backend.api_base" => cfg.backend.api_base = AppConfig::sanitize_base_url(value),
        "backend.request_timeout_ms" => cfg.backend.request_timeout_ms = number(value)?,
        "connection.max_attempts" => cfg.connection.max_attempts = number(value)?,
        "connection.retry_delay_ms" => cfg.connection.retry_delay_ms = number(value)?,
        "connection.connect_timeout_ms" => cfg.connection.connect_timeout_ms = number(value)?,
        "connection.backoff" => {
            cfg.connection.backoff = match value.trim() {
                "fixed" => BackoffKind::Fixed,
                "exponential" => BackoffKind::Exponential,
                other => return Err(format!("expected fixed/exponential, got {other:?}")),
            }
        }
        "connection.max_retry_delay_ms" => cfg.connection.max_retry_delay_ms = number(value)?,
        "connection.jitter_factor" => cfg.connection.jitter_factor = number(value)?,
        "connection.bucket_capacity" => cfg.connection.bucket_capacity = number(value)?,
        "connection.validation" => {
            cfg.connection.validation = match value.trim() {
                "loose" => ValidationMode::Loose,
                "strict" => ValidationMode::Strict,
                other => return Err(format!("expected loose/strict, got {other:?}")),
            }
        }
        "device.device_id" => cfg.device.device_id = value.trim().to_string(),
        "device.frame_interval_ms" => cfg.device.frame_interval_ms = number(value)?,
        "logging.level" => cfg.logging.level = value.trim().to_string(),
        "logging.directory" => cfg.logging.directory = value.trim().to_string(),
        "logging.json_output" => {
            cfg.logging.json_output = value
                .trim()
                .parse()
                .map_err(|_| "expected true/false".to_string())?;
        }
        _ => return Err(format!("unknown setting key: {key}")),
    }
    Ok(())
}

fn backoff_name(kind: BackoffKind) -> &'static str {
    match kind {
        BackoffKind::Fixed => "fixed",
        BackoffKind::Exponential => "exponential",
    }
}

fn validation_name(mode: ValidationMode) -> &'static str {
    match mode {
        ValidationMode::Loose => "loose",
        ValidationMode::Strict => "strict",
    }
}

fn print_config_text(cfg: &AppConfig) {
    println!("{}", style("Backend").bold().underlined());
    println!("  backend.socket_url              {}", cfg.backend.socket_url);
    println!("  backend.api_base                {}", cfg.backend.api_base);
    println!("  backend.request_timeout_ms      {}", cfg.backend.request_timeout_ms);

    println!();
    println!("{}", style("Connection").bold().underlined());
    println!("  connection.max_attempts         {}", cfg.connection.max_attempts);
    println!("  connection.retry_delay_ms       {}", cfg.connection.retry_delay_ms);
    println!("  connection.connect_timeout_ms   {}", cfg.connection.connect_timeout_ms);
    println!("  connection.backoff              {}", backoff_name(cfg.connection.backoff));
    println!("  connection.max_retry_delay_ms   {}", cfg.connection.max_retry_delay_ms);
    println!("  connection.jitter_factor        {}", cfg.connection.jitter_factor);
    println!("  connection.bucket_capacity      {}", cfg.connection.bucket_capacity);
    println!("  connection.validation           {}", validation_name(cfg.connection.validation));

    println!();
    println!("{}", style("Device").bold().underlined());
    println!(
        "  device.device_id                {}",
        if cfg.device.device_id.is_empty() {
            format!("(hostname: {})", cfg.device.effective_device_id())
        } else {
            cfg.device.device_id.clone()
        }
    );
    println!("  device.frame_interval_ms        {}", cfg.device.frame_interval_ms);

    println!();
    println!("{}", style("Logging").bold().underlined());
    println!("  logging.level                   {}", cfg.logging.level);
    println!("  logging.directory               {}", cfg.logging.directory);
    println!("  logging.json_output             {}", cfg.logging.json_output);
}

/// Load the file as written, without environment overrides.
fn load_file(path: &Path) -> HwResult<AppConfig> {
    if path.exists() {
        AppConfig::load_from_file(path)
    } else {
        Ok(AppConfig::default())
    }
}

pub async fn run(
    effective: AppConfig,
    path: &Path,
    action: ConfigAction,
    format: OutputFormat,
) -> HwResult<()> {
    match action {
        ConfigAction::Show => match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&effective)?);
            }
            OutputFormat::Text => print_config_text(&effective),
        },
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                println!(
                    "{} {} already exists (use --force to overwrite)",
                    style("SKIP").yellow().bold(),
                    path.display()
                );
                return Ok(());
            }
            AppConfig::default().save_to_file(path)?;
            println!("{} Wrote {}", style("OK").green().bold(), path.display());
        }
        ConfigAction::Get { key } => match get_setting_value(&effective, &key) {
            Some(value) => match format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "key": key, "value": value })),
                OutputFormat::Text => println!("{key} = {value}"),
            },
            None => {
                println!("{} Unknown setting key: {key}", style("ERROR").red().bold());
                println!("  Use `hivewatch config show` to see available keys.");
            }
        },
        ConfigAction::Set { key, value } => {
            let mut cfg = load_file(path)?;
            if let Err(e) = set_setting_value(&mut cfg, &key, &value) {
                println!("{} Failed to set {key}: {e}", style("ERROR").red().bold());
                return Ok(());
            }
            cfg.validate()?;
            cfg.save_to_file(path)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "key": key, "value": value, "saved": true }));
                }
                OutputFormat::Text => println!("{} {key} = {value}", style("SET").green().bold()),
            }
        }
        ConfigAction::Check => match effective.validate() {
            Ok(()) => println!("{} configuration is valid", style("OK").green().bold()),
            Err(e) => {
                println!("{} {e}", style("INVALID").red().bold());
                return Err(HwError::Config(format!("{} failed validation", path.display())));
            }
        },
    }
    Ok(())
}
