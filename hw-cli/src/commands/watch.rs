//! Watch command - keep a supervised connection and print what arrives.

use std::str::FromStr;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use hw_core::config::ConfigHandle;
use hw_core::error::HwResult;
use hw_models::BackendEvent;
use hw_services::{AppState, SupervisorHandle, SupervisorPhase, SupervisorState};
use hw_socket::Transport;

use crate::OutputFormat;

/// Operator commands accepted on stdin while watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Lifecycle(AppState),
    Refresh,
    Retry,
    Status,
    News,
    Quit,
}

impl FromStr for Control {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "refresh" | "r" => Ok(Self::Refresh),
            "retry" => Ok(Self::Retry),
            "status" | "s" => Ok(Self::Status),
            "news" => Ok(Self::News),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => AppState::from_str(other)
                .map(Self::Lifecycle)
                .map_err(|_| format!("unknown command: {other}")),
        }
    }
}

/// Run the watch command.
pub async fn run(config: ConfigHandle, url: Option<String>, format: OutputFormat) -> HwResult<()> {
    if let Some(url) = url {
        let mut cfg = config.write().await;
        cfg.backend.socket_url = url.trim().to_string();
        cfg.validate()?;
    }

    let (supervisor, transport) = super::start_supervisor(&config).await?;
    let handle = supervisor.handle();

    if format == OutputFormat::Text {
        println!(
            "{} Watching {} (commands: background, foreground, refresh, retry, status, news, quit)",
            style("HiveWatch").bold(),
            transport.url()
        );
    }

    let signals = transport.signals();
    let on_event = signals.event.subscribe(move |event: &BackendEvent| print_event(event, format));
    let on_error = signals.error.subscribe(|error| {
        if error.is_per_message() {
            eprintln!("  {} {error}", style("WARN").yellow());
        }
    });

    let mut states = handle.subscribe();
    let mut last_phase = SupervisorPhase::Idle;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                if state.phase != last_phase {
                    last_phase = state.phase;
                    print_phase(&state, format);
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match line.parse::<Control>() {
                        Ok(Control::Quit) => break,
                        Ok(control) => apply(&handle, control, format).await,
                        Err(e) => eprintln!("  {} {e}", style("?").yellow()),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("stdin closed: {e}");
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if format == OutputFormat::Text {
                    println!("\n  Disconnecting...");
                }
                break;
            }
        }
    }

    on_event.unsubscribe();
    on_error.unsubscribe();
    supervisor.shutdown().await;
    info!("watch finished");
    Ok(())
}

async fn apply(handle: &SupervisorHandle, control: Control, format: OutputFormat) {
    match control {
        Control::Lifecycle(state) => handle.set_app_state(state),
        Control::Refresh => handle.refresh(),
        Control::Retry => handle.retry_now(),
        Control::Status => print_summary(&handle.state(), format),
        Control::News => match handle.fetch_news().await {
            Ok(articles) => {
                for article in articles.iter().take(5) {
                    println!("  {} {}", style(&article.date).dim(), article.title);
                }
            }
            Err(e) => eprintln!("  {} {e}", style("FAIL").red().bold()),
        },
        Control::Quit => {}
    }
}

fn print_event(event: &BackendEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(event).unwrap_or_default());
        }
        OutputFormat::Text => {
            println!(
                "  {} {} {} {}",
                style(super::format_timestamp(event)).dim(),
                style(format!("[{}]", event.event_type)).cyan(),
                super::styled_severity(event.effective_severity()),
                event.message
            );
        }
    }
}

fn print_phase(state: &SupervisorState, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "phase": state.phase.to_string(),
                "status": state.status.to_string(),
                "attempts": state.connection_attempts,
                "error": state.last_error.as_ref().map(|e| e.to_string()),
            });
            println!("{json}");
        }
        OutputFormat::Text => {
            let label = style(state.phase.to_string());
            let label = match state.phase {
                SupervisorPhase::Connected => label.green().bold(),
                SupervisorPhase::Failed => label.red().bold(),
                SupervisorPhase::Attempting => label.yellow(),
                _ => label.dim(),
            };
            match (&state.phase, &state.last_error) {
                (SupervisorPhase::Attempting, _) => {
                    println!("  {label} (attempt {})", state.connection_attempts)
                }
                (SupervisorPhase::Failed, Some(e)) if e.is_terminal() => {
                    println!("  {label}: {e}. Type 'retry' to try again.")
                }
                _ => println!("  {label}"),
            }
        }
    }
}

fn print_summary(state: &SupervisorState, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "phase": state.phase.to_string(),
                "status": state.status.to_string(),
                "connected": state.is_connected,
                "attempts": state.connection_attempts,
                "app_state": state.app_state.to_string(),
                "loading": state.is_loading,
                "events": state.events.len(),
                "insights": state.insights.len(),
                "last_error": state.last_error.as_ref().map(|e| e.to_string()),
                "history_error": state.history_error,
            });
            println!("{json}");
        }
        OutputFormat::Text => {
            println!("  Phase:       {}", state.phase);
            println!("  Status:      {}", state.status);
            println!("  App state:   {}", state.app_state);
            println!("  Attempts:    {}", state.connection_attempts);
            println!(
                "  Buckets:     {} events, {} insights{}",
                state.events.len(),
                state.insights.len(),
                if state.is_loading { " (loading)" } else { "" }
            );
            if let Some(ref e) = state.last_error {
                println!("  Last error:  {e}");
            }
            if let Some(ref e) = state.history_error {
                println!("  History:     {}", style(e).yellow());
            }
        }
    }
}
