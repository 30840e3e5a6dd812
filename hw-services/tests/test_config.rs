//! Configuration flowing into the supervisor and transport.

mod common;

use std::time::Duration;

use hw_core::config::{AppConfig, BackoffKind, ValidationMode};
use hw_services::SupervisorSettings;
use hw_socket::{ConnectionStatus, EventValidator, SocketTransport, Transport};
use tempfile::TempDir;

#[test]
fn config_file_drives_supervisor_settings() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[backend]
socket_url = "ws://10.0.0.5:9000/live"

[connection]
max_attempts = 3
retry_delay_ms = 250
backoff = "exponential"
max_retry_delay_ms = 1000
bucket_capacity = 50
validation = "strict"
"#,
    )
    .unwrap();

    let config = AppConfig::load_from_file(&path).unwrap();
    config.validate().unwrap();

    let settings = SupervisorSettings::from_config(&config.connection);
    assert_eq!(settings.max_attempts, 3);
    assert_eq!(settings.bucket_capacity, 50);
    assert_eq!(settings.backoff.kind, BackoffKind::Exponential);
    assert_eq!(settings.backoff.delay(1), Duration::from_millis(250));
    assert_eq!(settings.backoff.delay(10), Duration::from_millis(1000));

    let transport = SocketTransport::from_config(&config.backend, &config.connection);
    assert_eq!(transport.url(), "ws://10.0.0.5:9000/live");
    assert_eq!(transport.status(), ConnectionStatus::Disconnected);
    assert_eq!(
        EventValidator::new(config.connection.validation).mode(),
        ValidationMode::Strict
    );
}

#[test]
fn defaults_match_documented_values() {
    let settings = SupervisorSettings::default();
    assert_eq!(settings.max_attempts, 5);
    assert_eq!(settings.bucket_capacity, 500);
    assert_eq!(settings.backoff.kind, BackoffKind::Fixed);
    assert_eq!(settings.backoff.delay(1), Duration::from_secs(3));
    assert_eq!(settings.backoff.delay(4), Duration::from_secs(3));
}

#[test]
fn zero_attempts_is_clamped() {
    let mut config = AppConfig::default();
    config.connection.max_attempts = 0;
    assert!(config.validate().is_err());
    assert_eq!(SupervisorSettings::from_config(&config.connection).max_attempts, 1);
}
