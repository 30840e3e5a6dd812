//! Application configuration management.
//!
//! Handles loading, saving, and validating the client configuration: backend
//! endpoints, connection tuning, device identity and logging. Configuration is
//! persisted as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::constants;
use crate::error::{HwError, HwResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend endpoint settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Live connection tuning.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Capture device settings.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// WebSocket URL of the live endpoint (e.g. "wss://api.example.com/live").
    #[serde(default = "default_socket_url")]
    pub socket_url: String,

    /// Base URL of the REST API (e.g. "https://api.example.com/api").
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// REST request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

/// How the delay between reconnection attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// The same delay before every attempt.
    #[default]
    Fixed,
    /// Doubling delay, capped and optionally jittered.
    Exponential,
}

/// How strictly inbound events are checked before delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Only `id`, `type` and `timestamp` must be strings.
    #[default]
    Loose,
    /// Additionally checks enum membership and timestamp format.
    Strict,
}

/// Live connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Automatic connection attempts before giving up (at least 1).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before an automatic retry, in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Socket establishment timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Backoff policy between attempts.
    #[serde(default)]
    pub backoff: BackoffKind,

    /// Upper bound for exponential backoff, in milliseconds.
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,

    /// Jitter fraction (0.0 to 1.0) applied to exponential delays.
    #[serde(default)]
    pub jitter_factor: f64,

    /// Maximum number of entries kept in each event bucket.
    #[serde(default = "default_bucket_capacity")]
    pub bucket_capacity: usize,

    /// Inbound event validation mode.
    #[serde(default)]
    pub validation: ValidationMode,
}

/// Capture device configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Identifier sent with every frame. Empty means "use the hostname".
    #[serde(default)]
    pub device_id: String,

    /// Interval between streamed frames, in milliseconds.
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_socket_url() -> String {
    constants::DEFAULT_SOCKET_URL.to_string()
}

fn default_api_base() -> String {
    constants::DEFAULT_API_BASE.to_string()
}

fn default_request_timeout() -> u64 {
    constants::DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_max_attempts() -> u32 {
    constants::DEFAULT_MAX_ATTEMPTS
}

fn default_retry_delay() -> u64 {
    constants::DEFAULT_RETRY_DELAY_MS
}

fn default_connect_timeout() -> u64 {
    constants::DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_max_retry_delay() -> u64 {
    30_000
}

fn default_bucket_capacity() -> usize {
    constants::DEFAULT_BUCKET_CAPACITY
}

fn default_frame_interval() -> u64 {
    constants::DEFAULT_FRAME_INTERVAL_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            socket_url: default_socket_url(),
            api_base: default_api_base(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            connect_timeout_ms: default_connect_timeout(),
            backoff: BackoffKind::default(),
            max_retry_delay_ms: default_max_retry_delay(),
            jitter_factor: 0.0,
            bucket_capacity: default_bucket_capacity(),
            validation: ValidationMode::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            frame_interval_ms: default_frame_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl ConnectionConfig {
    /// Delay before an automatic retry.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Socket establishment timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Upper bound for exponential backoff.
    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }
}

impl DeviceConfig {
    /// The device id to stamp on frames, falling back to the hostname.
    pub fn effective_device_id(&self) -> String {
        if self.device_id.trim().is_empty() {
            Platform::hostname()
        } else {
            self.device_id.trim().to_string()
        }
    }

    /// Interval between streamed frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl AppConfig {
    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> HwResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> HwResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| HwError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> HwResult<PathBuf> {
        Ok(Platform::config_dir()?.join("config.toml"))
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> HwResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Platform::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Apply `HIVEWATCH_SOCKET_URL` / `HIVEWATCH_API_BASE` overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(constants::ENV_SOCKET_URL).filter(|v| !v.trim().is_empty()) {
            debug!("socket url overridden from environment");
            self.backend.socket_url = url.trim().to_string();
        }
        if let Some(base) = lookup(constants::ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            debug!("api base overridden from environment");
            self.backend.api_base = base.trim().to_string();
        }
    }

    /// Check the configuration for values the connection layer cannot use.
    pub fn validate(&self) -> HwResult<()> {
        check_scheme("backend.socket_url", &self.backend.socket_url, &["ws", "wss"])?;
        check_scheme("backend.api_base", &self.backend.api_base, &["http", "https"])?;

        if self.connection.max_attempts == 0 {
            return Err(HwError::Config(
                "connection.max_attempts must be at least 1".into(),
            ));
        }
        if self.connection.bucket_capacity == 0 {
            return Err(HwError::Config(
                "connection.bucket_capacity must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.connection.jitter_factor) {
            return Err(HwError::Config(
                "connection.jitter_factor must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Normalize an API base URL: trim whitespace, quotes and trailing slashes.
    pub fn sanitize_base_url(address: &str) -> String {
        address
            .trim()
            .trim_matches('"')
            .trim()
            .trim_end_matches('/')
            .to_string()
    }
}

fn check_scheme(field: &str, value: &str, allowed: &[&str]) -> HwResult<()> {
    if value.trim().is_empty() {
        return Err(HwError::MissingConfig(field.to_string()));
    }
    let parsed = url::Url::parse(value.trim())
        .map_err(|e| HwError::Config(format!("{field} is not a valid url: {e}")))?;
    if !allowed.contains(&parsed.scheme()) {
        return Err(HwError::Config(format!(
            "{field} must use one of [{}], got {}",
            allowed.join(", "),
            parsed.scheme()
        )));
    }
    Ok(())
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Clone the current configuration.
    pub async fn snapshot(&self) -> AppConfig {
        self.inner.read().await.clone()
    }
}
