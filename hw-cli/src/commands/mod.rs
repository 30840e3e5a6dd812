//! CLI command implementations.

pub mod config;
pub mod history;
pub mod stream;
pub mod watch;

use std::sync::Arc;

use console::{style, StyledObject};

use hw_api::ApiClient;
use hw_core::config::ConfigHandle;
use hw_core::error::HwResult;
use hw_models::{BackendEvent, Severity};
use hw_services::{ConnectionSupervisor, SupervisorSettings};
use hw_socket::SocketTransport;

/// Helper to create an API client from config.
pub async fn create_api_client(config: &ConfigHandle) -> HwResult<ApiClient> {
    let backend = config.read().await.backend.clone();
    ApiClient::new(&backend)
}

/// Build the transport and history client from config and start supervising.
pub async fn start_supervisor(config: &ConfigHandle) -> HwResult<(ConnectionSupervisor, Arc<SocketTransport>)> {
    let cfg = config.snapshot().await;
    let transport = Arc::new(SocketTransport::from_config(&cfg.backend, &cfg.connection));
    let api = ApiClient::new(&cfg.backend)?;
    let supervisor = ConnectionSupervisor::start(
        transport.clone(),
        Arc::new(api),
        SupervisorSettings::from_config(&cfg.connection),
    );
    Ok((supervisor, transport))
}

/// Truncate a string to a maximum number of characters, appending an
/// ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    } else {
        s.chars().take(max_len).collect()
    }
}

/// Render an event timestamp in local time, or verbatim if it does not parse.
pub fn format_timestamp(event: &BackendEvent) -> String {
    match event.parsed_timestamp() {
        Some(ts) => ts
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => event.timestamp.clone(),
    }
}

pub fn styled_severity(severity: Severity) -> StyledObject<&'static str> {
    let label = severity.as_str();
    match severity {
        Severity::Critical => style(label).red().bold(),
        Severity::High => style(label).red(),
        Severity::Medium => style(label).yellow(),
        Severity::Low => style(label).dim(),
    }
}
