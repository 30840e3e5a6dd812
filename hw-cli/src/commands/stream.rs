//! Stream command - send image files as camera frames at a fixed interval.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use base64::Engine;
use console::style;
use tracing::{debug, info, warn};

use hw_core::config::ConfigHandle;
use hw_core::error::{ConnectionError, HwError, HwResult};
use hw_models::{FrameData, FrameMetadata};
use hw_services::SupervisorPhase;
use hw_socket::Transport;

/// Run the stream command.
pub async fn run(
    config: ConfigHandle,
    files: Vec<PathBuf>,
    interval_ms: Option<u64>,
    repeat: bool,
    device: Option<String>,
) -> HwResult<()> {
    let (interval, device_id) = {
        let cfg = config.read().await;
        let interval = interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| cfg.device.frame_interval());
        let device_id = device
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| cfg.device.effective_device_id());
        (interval.max(Duration::from_millis(1)), device_id)
    };

    let (supervisor, transport) = super::start_supervisor(&config).await?;
    let handle = supervisor.handle();

    println!(
        "{} Connecting to {} as {}...",
        style("[1/2]").bold().dim(),
        transport.url(),
        style(&device_id).cyan()
    );
    let state = handle
        .wait_for(|s| matches!(s.phase, SupervisorPhase::Connected | SupervisorPhase::Failed))
        .await;
    match state {
        Some(s) if s.phase == SupervisorPhase::Connected => {
            println!("  {} Connected.", style("OK").green().bold());
        }
        Some(s) => {
            let error = s.last_error.unwrap_or(ConnectionError::MaxAttemptsExceeded {
                attempts: s.connection_attempts,
            });
            println!("  {} {error}", style("FAIL").red().bold());
            supervisor.shutdown().await;
            return Err(HwError::Connection(error));
        }
        None => return Err(HwError::Internal("supervisor stopped".into())),
    }

    let dropped = Arc::new(AtomicUsize::new(0));
    let dropped_counter = Arc::clone(&dropped);
    let on_error = transport.signals().error.subscribe(move |error| {
        if matches!(error, ConnectionError::NotConnected) {
            dropped_counter.fetch_add(1, Ordering::Relaxed);
        }
    });
    let received = Arc::new(AtomicUsize::new(0));
    let received_counter = Arc::clone(&received);
    let on_event = transport.signals().event.subscribe(move |event| {
        received_counter.fetch_add(1, Ordering::Relaxed);
        println!(
            "  {} {} {}",
            style(format!("[{}]", event.event_type)).cyan(),
            super::styled_severity(event.effective_severity()),
            event.message
        );
    });

    println!(
        "{} Streaming {} file(s) every {}ms{} (Ctrl+C to stop)",
        style("[2/2]").bold().dim(),
        files.len(),
        interval.as_millis(),
        if repeat { ", repeating" } else { "" }
    );

    let mut ticker = tokio::time::interval(interval);
    let mut sent = 0usize;
    let mut next = 0usize;
    let mut outcome = Ok(());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if next == files.len() {
                    if !repeat {
                        break;
                    }
                    next = 0;
                }
                let path = &files[next];
                next += 1;
                match load_frame(path, &device_id).await {
                    Ok(frame) => {
                        handle.send_frame(&frame);
                        sent += 1;
                        debug!("queued frame {sent} from {}", path.display());
                    }
                    Err(e) => {
                        warn!("skipping {}: {e}", path.display());
                        println!("  {} {}: {e}", style("SKIP").yellow(), path.display());
                    }
                }
                if handle.state().phase == SupervisorPhase::Failed {
                    outcome = Err(HwError::Connection(ConnectionError::MaxAttemptsExceeded {
                        attempts: handle.state().connection_attempts,
                    }));
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    on_error.unsubscribe();
    on_event.unsubscribe();
    supervisor.shutdown().await;

    let dropped = dropped.load(Ordering::Relaxed);
    println!(
        "\n  Sent {} frame(s), {} dropped while disconnected, {} event(s) received.",
        sent.saturating_sub(dropped),
        dropped,
        received.load(Ordering::Relaxed)
    );
    info!("stream finished after {sent} frames");
    outcome
}

/// Read an image file and wrap it as a frame.
async fn load_frame(path: &Path, device_id: &str) -> HwResult<FrameData> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read frame {}", path.display()))?;
    if bytes.is_empty() {
        return Err(anyhow!("frame {} is empty", path.display()).into());
    }
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let frame = FrameData::now(encoded, device_id);
    Ok(match image_format(path) {
        Some(format) => frame.with_metadata(FrameMetadata {
            format: Some(format),
            ..Default::default()
        }),
        None => frame,
    })
}

/// Image format from the file extension, normalized to lowercase.
fn image_format(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("jpeg".into()),
        "png" | "webp" | "gif" | "bmp" => Some(ext),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_format() {
        assert_eq!(image_format(Path::new("hive.JPG")).as_deref(), Some("jpeg"));
        assert_eq!(image_format(Path::new("a/b/frame.png")).as_deref(), Some("png"));
        assert_eq!(image_format(Path::new("notes.txt")), None);
        assert_eq!(image_format(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn test_load_frame_encodes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("frame.jpeg");
        std::fs::write(&path, b"hive").unwrap();

        let frame = load_frame(&path, "cam-7").await.unwrap();
        assert_eq!(frame.frame, "aGl2ZQ==");
        assert_eq!(frame.device_id, "cam-7");
        assert_eq!(frame.metadata.unwrap().format.as_deref(), Some("jpeg"));
    }

    #[tokio::test]
    async fn test_load_frame_rejects_missing_and_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = load_frame(&dir.path().join("missing.png"), "cam").await;
        match missing {
            Err(HwError::Other(e)) => {
                assert!(e.to_string().contains("missing.png"));
                assert!(e.root_cause().downcast_ref::<std::io::Error>().is_some());
            }
            other => panic!("expected a contextual read error, got {other:?}"),
        }

        let empty = dir.path().join("empty.png");
        std::fs::write(&empty, b"").unwrap();
        let err = load_frame(&empty, "cam").await.unwrap_err();
        assert!(matches!(err, HwError::Other(_)));
        assert!(err.to_string().contains("empty.png"));
    }
}
