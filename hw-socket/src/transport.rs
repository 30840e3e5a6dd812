//! WebSocket transport.
//!
//! Owns a single socket endpoint and turns its lifecycle into notifications:
//! open, validated events, errors, close and status changes. The transport
//! never reconnects on its own; that is the supervisor's job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use hw_core::config::{BackendConfig, ConnectionConfig};
use hw_core::error::ConnectionError;
use hw_models::{BackendEvent, OutboundMessage};

use crate::registry::SubscriberRegistry;
use crate::validator::EventValidator;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the connection ended without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Status of the underlying socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// How an opened connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    /// Whether a close frame was exchanged.
    pub was_clean: bool,
}

impl CloseInfo {
    /// The connection dropped without a close handshake.
    pub fn abnormal() -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
            was_clean: false,
        }
    }

    fn from_frame(frame: Option<CloseFrame>) -> Self {
        match frame {
            Some(frame) => Self {
                code: frame.code.into(),
                reason: frame.reason.as_str().to_string(),
                was_clean: true,
            },
            None => Self {
                code: CloseCode::Status.into(),
                reason: String::new(),
                was_clean: true,
            },
        }
    }
}

/// Notification channels exposed by a transport.
#[derive(Clone, Default)]
pub struct TransportSignals {
    pub open: SubscriberRegistry<()>,
    pub event: SubscriberRegistry<BackendEvent>,
    pub error: SubscriberRegistry<ConnectionError>,
    pub close: SubscriberRegistry<CloseInfo>,
    pub status: SubscriberRegistry<ConnectionStatus>,
}

impl TransportSignals {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A single bidirectional connection to the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection.
    ///
    /// Returns immediately with `Ok` when already connected and with
    /// `AlreadyConnecting` while another attempt is in flight.
    async fn connect(&self) -> Result<(), ConnectionError>;

    /// Close the active connection, if any. Idempotent.
    fn disconnect(&self);

    /// Queue one outbound message. Failures are reported to error
    /// subscribers, never returned.
    fn send_message(&self, message: OutboundMessage);

    fn status(&self) -> ConnectionStatus;

    fn signals(&self) -> &TransportSignals;

    /// Queue `{"type": kind, "data": data}`.
    fn send(&self, kind: &str, data: serde_json::Value) {
        self.send_message(OutboundMessage::new(kind, data));
    }

    fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }
}

struct Link {
    generation: u64,
    outbound: mpsc::UnboundedSender<Message>,
}

struct LinkState {
    status: ConnectionStatus,
    /// Bumped by every connect attempt and every disconnect, so results of
    /// superseded attempts and links can be recognised.
    generation: u64,
    link: Option<Link>,
}

struct Shared {
    url: String,
    connect_timeout: Duration,
    validator: EventValidator,
    signals: TransportSignals,
    state: Mutex<LinkState>,
}

/// tokio-tungstenite implementation of [`Transport`].
#[derive(Clone)]
pub struct SocketTransport {
    shared: Arc<Shared>,
}

impl SocketTransport {
    pub fn new(url: impl Into<String>, connect_timeout: Duration, validator: EventValidator) -> Self {
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                connect_timeout,
                validator,
                signals: TransportSignals::new(),
                state: Mutex::new(LinkState {
                    status: ConnectionStatus::Disconnected,
                    generation: 0,
                    link: None,
                }),
            }),
        }
    }

    /// Build a transport from the application configuration.
    pub fn from_config(backend: &BackendConfig, connection: &ConnectionConfig) -> Self {
        Self::new(
            backend.socket_url.trim(),
            connection.connect_timeout(),
            EventValidator::new(connection.validation),
        )
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }
}

#[async_trait]
impl Transport for SocketTransport {
    async fn connect(&self) -> Result<(), ConnectionError> {
        let generation = {
            let mut state = self.shared.state.lock();
            match state.status {
                ConnectionStatus::Connected => return Ok(()),
                ConnectionStatus::Connecting => return Err(ConnectionError::AlreadyConnecting),
                _ => {}
            }
            state.status = ConnectionStatus::Connecting;
            state.generation += 1;
            state.generation
        };
        self.shared.signals.status.notify(&ConnectionStatus::Connecting);
        info!("socket connecting to {}", self.shared.url);

        let attempt = tokio::time::timeout(
            self.shared.connect_timeout,
            connect_async(self.shared.url.as_str()),
        )
        .await;

        match attempt {
            Ok(Ok((ws, _response))) => Arc::clone(&self.shared).open_link(generation, ws),
            Ok(Err(e)) => {
                let err = ConnectionError::Transport(e.to_string());
                self.shared.fail_attempt(generation, err.clone());
                Err(err)
            }
            Err(_) => {
                // The pending handshake future is dropped here, closing the socket.
                let err = ConnectionError::ConnectionTimeout(self.shared.connect_timeout);
                self.shared.fail_attempt(generation, err.clone());
                Err(err)
            }
        }
    }

    fn disconnect(&self) {
        let (link, changed) = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            let link = state.link.take();
            let changed = swap_status(&mut state, ConnectionStatus::Disconnected);
            (link, changed)
        };
        if changed {
            self.shared.signals.status.notify(&ConnectionStatus::Disconnected);
        }
        if let Some(link) = link {
            debug!("closing socket link {}", link.generation);
            // Dropping the sender tells the link task to send a close frame.
            drop(link.outbound);
        }
    }

    fn send_message(&self, message: OutboundMessage) {
        let outbound = {
            let state = self.shared.state.lock();
            if state.status == ConnectionStatus::Connected {
                state.link.as_ref().map(|link| link.outbound.clone())
            } else {
                None
            }
        };

        let Some(outbound) = outbound else {
            warn!("socket not connected, dropping '{}' message", message.kind);
            self.shared.emit_error(ConnectionError::NotConnected);
            return;
        };

        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                self.shared.emit_error(ConnectionError::Serialization(e.to_string()));
                return;
            }
        };

        if outbound.send(Message::Text(text.into())).is_err() {
            self.shared
                .emit_error(ConnectionError::Transport("connection closed before send".into()));
        }
    }

    fn status(&self) -> ConnectionStatus {
        self.shared.state.lock().status
    }

    fn signals(&self) -> &TransportSignals {
        &self.shared.signals
    }
}

/// Set `status`, returning whether it actually changed.
fn swap_status(state: &mut LinkState, status: ConnectionStatus) -> bool {
    if state.status == status {
        return false;
    }
    debug!("socket status: {} -> {}", state.status, status);
    state.status = status;
    true
}

impl Shared {
    fn emit_error(&self, err: ConnectionError) {
        self.signals.error.notify(&err);
    }

    fn set_status_if_current(&self, generation: u64, status: ConnectionStatus) -> bool {
        let changed = {
            let mut state = self.state.lock();
            state.generation == generation && swap_status(&mut state, status)
        };
        if changed {
            self.signals.status.notify(&status);
        }
        changed
    }

    fn fail_attempt(&self, generation: u64, err: ConnectionError) {
        warn!("socket connect to {} failed: {err}", self.url);
        self.set_status_if_current(generation, ConnectionStatus::Error);
        self.emit_error(err);
    }

    fn open_link(self: Arc<Self>, generation: u64, ws: WsStream) -> Result<(), ConnectionError> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                drop(state);
                debug!("socket opened after disconnect, closing it");
                tokio::spawn(async move {
                    let mut ws = ws;
                    let _ = ws.close(None).await;
                });
                return Err(ConnectionError::Transport(
                    "disconnected while connecting".into(),
                ));
            }
            state.link = Some(Link {
                generation,
                outbound: outbound_tx,
            });
            swap_status(&mut state, ConnectionStatus::Connected);
        }
        self.signals.status.notify(&ConnectionStatus::Connected);
        info!("socket connected to {}", self.url);
        self.signals.open.notify(&());

        tokio::spawn(Arc::clone(&self).run_link(generation, ws, outbound_rx));
        Ok(())
    }

    async fn run_link(
        self: Arc<Self>,
        generation: u64,
        ws: WsStream,
        mut outbound: mpsc::UnboundedReceiver<Message>,
    ) {
        let (mut sink, mut stream) = ws.split();

        let close = loop {
            tokio::select! {
                queued = outbound.recv() => match queued {
                    Some(message) => {
                        if let Err(e) = sink.send(message).await {
                            warn!("socket write failed: {e}");
                            self.link_fault(generation, ConnectionError::Transport(e.to_string()));
                            break CloseInfo::abnormal();
                        }
                    }
                    None => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "client disconnect".into(),
                        };
                        let _ = sink.send(Message::Close(Some(frame))).await;
                        break CloseInfo {
                            code: CloseCode::Normal.into(),
                            reason: "client disconnect".to_string(),
                            was_clean: true,
                        };
                    }
                },
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => self.handle_text(text),
                        Err(e) => self.emit_error(ConnectionError::MalformedPayload(format!(
                            "binary frame is not utf-8: {e}"
                        ))),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        // Flush the close reply queued by tungstenite.
                        let _ = sink.flush().await;
                        break CloseInfo::from_frame(frame);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("socket read failed: {e}");
                        self.link_fault(generation, ConnectionError::Transport(e.to_string()));
                        break CloseInfo::abnormal();
                    }
                    None => break CloseInfo::abnormal(),
                }
            }
        };

        self.finish_link(generation, close);
    }

    fn link_fault(&self, generation: u64, err: ConnectionError) {
        self.set_status_if_current(generation, ConnectionStatus::Error);
        self.emit_error(err);
    }

    fn finish_link(&self, generation: u64, close: CloseInfo) {
        let changed = {
            let mut state = self.state.lock();
            if state.generation == generation {
                state.link = None;
                swap_status(&mut state, ConnectionStatus::Disconnected)
            } else {
                false
            }
        };
        if changed {
            self.signals.status.notify(&ConnectionStatus::Disconnected);
        }
        info!(
            "socket closed (code {}, clean: {}) {}",
            close.code, close.was_clean, close.reason
        );
        self.signals.close.notify(&close);
    }

    fn handle_text(&self, text: &str) {
        let raw: serde_json::Value = match serde_json::from_str(text) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("dropping malformed socket payload: {e}");
                self.emit_error(ConnectionError::MalformedPayload(e.to_string()));
                return;
            }
        };

        if let Err(fields) = self.validator.check(&raw) {
            warn!("dropping invalid event, bad fields: {}", fields.join(", "));
            self.emit_error(ConnectionError::InvalidEvent(format!(
                "missing or invalid fields: {}",
                fields.join(", ")
            )));
            return;
        }

        match serde_json::from_value::<BackendEvent>(raw) {
            Ok(event) => {
                debug!("socket event {} ({})", event.id, event.event_type);
                self.signals.event.notify(&event);
            }
            Err(e) => {
                warn!("dropping undecodable event: {e}");
                self.emit_error(ConnectionError::InvalidEvent(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use crate::validator::is_valid_event;

    fn transport_for(url: &str) -> SocketTransport {
        SocketTransport::new(url, Duration::from_millis(500), EventValidator::default())
    }

    /// Accept one socket connection and hand it to `script`.
    async fn serve_one<F, Fut>(script: F) -> String
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            script(ws).await;
        });
        format!("ws://{addr}")
    }

    fn record<T: Clone + Send + 'static>(registry: &SubscriberRegistry<T>) -> Arc<Mutex<Vec<T>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _ = registry.subscribe(move |value: &T| sink.lock().push(value.clone()));
        seen
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(3), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionStatus::Error.to_string(), "error");
    }

    #[tokio::test]
    async fn test_send_while_disconnected() {
        let transport = transport_for("ws://127.0.0.1:9");
        let errors = record(&transport.signals().error);

        transport.send("frame", serde_json::json!({"frame": "x"}));

        assert_eq!(*errors.lock(), vec![ConnectionError::NotConnected]);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = transport_for(&format!("ws://{addr}"));
        let statuses = record(&transport.signals().status);
        let errors = record(&transport.signals().error);
        let closes = record(&transport.signals().close);

        let result = transport.connect().await;
        assert!(matches!(result, Err(ConnectionError::Transport(_))));
        assert_eq!(transport.status(), ConnectionStatus::Error);
        assert_eq!(
            *statuses.lock(),
            vec![ConnectionStatus::Connecting, ConnectionStatus::Error]
        );
        assert_eq!(errors.lock().len(), 1);
        assert!(closes.lock().is_empty());
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        // Accepts TCP but never answers the handshake.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let transport = SocketTransport::new(
            format!("ws://{addr}"),
            Duration::from_millis(100),
            EventValidator::default(),
        );
        let result = transport.connect().await;
        assert_eq!(
            result,
            Err(ConnectionError::ConnectionTimeout(Duration::from_millis(100)))
        );
        assert_eq!(transport.status(), ConnectionStatus::Error);
    }

    #[tokio::test]
    async fn test_receive_valid_and_invalid_frames() {
        let url = serve_one(|mut ws| async move {
            ws.send(Message::Text("not json".into())).await.unwrap();
            ws.send(Message::Text(r#"{"id":"x","type":"system"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(
                r#"{"id":"1","type":"predator","timestamp":"2025-01-01T00:00:00Z","message":"Bear detected"}"#
                    .into(),
            ))
            .await
            .unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        })
        .await;

        let transport = transport_for(&url);
        let events = record(&transport.signals().event);
        let errors = record(&transport.signals().error);

        transport.connect().await.unwrap();
        assert!(transport.is_connected());

        wait_until(|| events.lock().len() == 1).await;
        let event = events.lock()[0].clone();
        assert_eq!(event.id, "1");
        assert_eq!(event.message, "Bear detected");

        let errors = errors.lock().clone();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ConnectionError::MalformedPayload(_)));
        assert!(matches!(errors[1], ConnectionError::InvalidEvent(_)));
        transport.disconnect();
    }

    #[tokio::test]
    async fn test_accepted_events_with_odd_optional_fields_are_delivered() {
        let url = serve_one(|mut ws| async move {
            for text in [
                r#"{"id":"1","type":"system","timestamp":"t","message":null}"#,
                r#"{"id":"2","type":"system","timestamp":"t","severity":"urgent"}"#,
                r#"{"id":"3","type":"system","timestamp":"t","imageUrl":42}"#,
            ] {
                assert!(is_valid_event(&serde_json::from_str(text).unwrap()));
                ws.send(Message::Text(text.into())).await.unwrap();
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        })
        .await;

        let transport = transport_for(&url);
        let events = record(&transport.signals().event);
        let errors = record(&transport.signals().error);

        transport.connect().await.unwrap();
        wait_until(|| events.lock().len() == 3).await;

        let delivered = events.lock().clone();
        let ids: Vec<&str> = delivered.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(delivered[0].message, "");
        assert_eq!(delivered[1].severity, None);
        assert_eq!(delivered[2].image_url, None);
        assert!(errors.lock().is_empty());
        transport.disconnect();
    }

    #[tokio::test]
    async fn test_send_reaches_server() {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let url = serve_one(move |mut ws| async move {
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    let _ = tx.send(text.to_string());
                }
            }
        })
        .await;

        let transport = transport_for(&url);
        transport.connect().await.unwrap();
        transport.send("frame", serde_json::json!({"deviceId": "cam-1"}));

        let received = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&received).unwrap();
        assert_eq!(value["type"], "frame");
        assert_eq!(value["data"]["deviceId"], "cam-1");
        transport.disconnect();
    }

    #[tokio::test]
    async fn test_remote_close() {
        let url = serve_one(|mut ws| async move {
            ws.close(Some(CloseFrame {
                code: CloseCode::Away,
                reason: "restarting".into(),
            }))
            .await
            .unwrap();
            while ws.next().await.is_some() {}
        })
        .await;

        let transport = transport_for(&url);
        let closes = record(&transport.signals().close);
        let statuses = record(&transport.signals().status);

        transport.connect().await.unwrap();
        wait_until(|| !closes.lock().is_empty()).await;

        let close = closes.lock()[0].clone();
        assert_eq!(close.code, 1001);
        assert_eq!(close.reason, "restarting");
        assert!(close.was_clean);
        assert_eq!(transport.status(), ConnectionStatus::Disconnected);
        assert_eq!(
            *statuses.lock(),
            vec![
                ConnectionStatus::Connecting,
                ConnectionStatus::Connected,
                ConnectionStatus::Disconnected
            ]
        );
    }

    #[tokio::test]
    async fn test_local_disconnect() {
        let url = serve_one(|mut ws| async move { while ws.next().await.is_some() {} }).await;

        let transport = transport_for(&url);
        let closes = record(&transport.signals().close);
        let opens = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opens);
        let _ = transport.signals().open.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        transport.connect().await.unwrap();
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert_eq!(transport.connect().await, Ok(()));

        transport.disconnect();
        assert_eq!(transport.status(), ConnectionStatus::Disconnected);
        wait_until(|| !closes.lock().is_empty()).await;
        assert_eq!(closes.lock()[0].code, 1000);

        // A second disconnect changes nothing.
        transport.disconnect();
        assert_eq!(transport.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_concurrent_connect_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let transport = SocketTransport::new(
            format!("ws://{addr}"),
            Duration::from_millis(300),
            EventValidator::default(),
        );
        let first = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.connect().await })
        };
        wait_until(|| transport.status() == ConnectionStatus::Connecting).await;

        assert_eq!(
            transport.connect().await,
            Err(ConnectionError::AlreadyConnecting)
        );
        assert!(first.await.unwrap().is_err());
    }
}
