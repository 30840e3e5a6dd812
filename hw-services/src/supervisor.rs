//! Connection supervisor.
//!
//! Owns the transport and keeps the live connection alive:
//! - Connects on start and retries failed attempts up to `max_attempts`,
//!   waiting the backoff delay between attempts
//! - Reconnects after an unsolicited close while in the foreground; a close
//!   in the background waits for the next foreground transition
//! - Aggregates inbound events into newest-first event/insight buckets and
//!   backfills them from the history source after every successful open
//! - Publishes an immutable `SupervisorState` snapshot through a watch channel
//!
//! All state lives in one actor task. Transport callbacks, timer expiries and
//! handle requests are forwarded into its signal channel and processed one at
//! a time.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use hw_core::config::ConnectionConfig;
use hw_core::error::{ConnectionError, HwResult};
use hw_models::{BackendEvent, FrameData, NewsArticle, OutboundMessage};
use hw_socket::{CloseInfo, ConnectionStatus, Subscription, Transport};

use crate::backoff::BackoffPolicy;
use crate::buckets::{BucketKind, EventBuckets, HistoryMark};
use crate::history::HistorySource;
use crate::lifecycle::AppState;
use crate::timer::RetryTimer;

/// Tuning for a supervisor instance.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Automatic attempts before giving up (at least 1).
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    /// Entries kept per bucket.
    pub bucket_capacity: usize,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from_config(&ConnectionConfig::default())
    }
}

impl SupervisorSettings {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: BackoffPolicy::from_config(config),
            bucket_capacity: config.bucket_capacity.max(1),
        }
    }
}

/// Where the supervisor is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    /// Started, no attempt made yet.
    Idle,
    /// A connection attempt is in flight.
    Attempting,
    Connected,
    /// Not connected; a retry may be pending.
    Disconnected,
    /// Every automatic attempt failed. Only a manual retry leaves this phase.
    Failed,
    /// Shut down.
    Stopped,
}

impl std::fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Attempting => write!(f, "attempting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot of everything a consumer can observe.
#[derive(Debug, Clone)]
pub struct SupervisorState {
    pub phase: SupervisorPhase,
    pub status: ConnectionStatus,
    pub is_connected: bool,
    /// Non-insight events, newest first.
    pub events: Vec<BackendEvent>,
    /// Insights, newest first.
    pub insights: Vec<BackendEvent>,
    pub last_event: Option<BackendEvent>,
    pub last_error: Option<ConnectionError>,
    /// Failure of the most recent history fetch, if any.
    pub history_error: Option<String>,
    /// A history fetch is running.
    pub is_loading: bool,
    /// Attempts made since the last successful open.
    pub connection_attempts: u32,
    pub app_state: AppState,
}

impl SupervisorState {
    fn initial() -> Self {
        Self {
            phase: SupervisorPhase::Idle,
            status: ConnectionStatus::Disconnected,
            is_connected: false,
            events: Vec::new(),
            insights: Vec::new(),
            last_event: None,
            last_error: None,
            history_error: None,
            is_loading: false,
            connection_attempts: 0,
            app_state: AppState::Active,
        }
    }
}

struct HistoryBatch {
    mark: HistoryMark,
    events: HwResult<Vec<BackendEvent>>,
    insights: HwResult<Vec<BackendEvent>>,
}

enum Signal {
    Opened,
    Event(BackendEvent),
    Error(ConnectionError),
    Closed(CloseInfo),
    Status(ConnectionStatus),
    AttemptFinished(Result<(), ConnectionError>),
    RetryFired(u64),
    Lifecycle(AppState),
    Refresh,
    RetryNow,
    HistoryLoaded(HistoryBatch),
    Shutdown(Option<oneshot::Sender<()>>),
}

/// Cloneable consumer handle.
///
/// Exposes state, sending, refresh, lifecycle and manual retry; connecting
/// and disconnecting stay with the supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    signals: mpsc::UnboundedSender<Signal>,
    state: watch::Receiver<SupervisorState>,
    transport: Arc<dyn Transport>,
    history: Arc<dyn HistorySource>,
}

impl SupervisorHandle {
    /// Current state snapshot.
    pub fn state(&self) -> SupervisorState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.clone()
    }

    /// Wait until `predicate` holds. Returns `None` once the supervisor is gone.
    pub async fn wait_for<F>(&self, predicate: F) -> Option<SupervisorState>
    where
        F: FnMut(&SupervisorState) -> bool,
    {
        let mut rx = self.state.clone();
        let state = rx.wait_for(predicate).await.ok()?.clone();
        Some(state)
    }

    /// Send a camera frame.
    pub fn send_frame(&self, frame: &FrameData) {
        match OutboundMessage::frame(frame) {
            Ok(message) => self.transport.send_message(message),
            Err(e) => self.serialization_failed(e),
        }
    }

    /// Send `{"type": kind, "data": payload}`.
    pub fn send<T: Serialize>(&self, kind: &str, payload: &T) {
        match OutboundMessage::from_payload(kind, payload) {
            Ok(message) => self.transport.send_message(message),
            Err(e) => self.serialization_failed(e),
        }
    }

    /// Re-run the historical fetch.
    pub fn refresh(&self) {
        self.signal(Signal::Refresh);
    }

    /// Report a foreground/background change.
    pub fn set_app_state(&self, state: AppState) {
        self.signal(Signal::Lifecycle(state));
    }

    /// Reset the attempt counter and connect now.
    pub fn retry_now(&self) {
        self.signal(Signal::RetryNow);
    }

    pub async fn fetch_news(&self) -> HwResult<Vec<NewsArticle>> {
        self.history.fetch_news().await
    }

    fn serialization_failed(&self, e: serde_json::Error) {
        warn!("failed to serialize outbound message: {e}");
        self.transport
            .signals()
            .error
            .notify(&ConnectionError::Serialization(e.to_string()));
    }

    fn signal(&self, signal: Signal) {
        if self.signals.send(signal).is_err() {
            debug!("supervisor stopped, signal dropped");
        }
    }
}

/// Owner of the supervisor actor.
pub struct ConnectionSupervisor {
    handle: SupervisorHandle,
    task: Option<JoinHandle<()>>,
}

impl ConnectionSupervisor {
    /// Start supervising `transport`. Must be called within a tokio runtime.
    ///
    /// The first connection attempt is made immediately.
    pub fn start(
        transport: Arc<dyn Transport>,
        history: Arc<dyn HistorySource>,
        settings: SupervisorSettings,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SupervisorState::initial());

        let subscriptions = forward_transport_signals(transport.as_ref(), &signals_tx);
        let actor = Actor {
            buckets: EventBuckets::new(settings.bucket_capacity),
            settings,
            transport: Arc::clone(&transport),
            history: Arc::clone(&history),
            signals_tx: signals_tx.clone(),
            state_tx,
            subscriptions,
            phase: SupervisorPhase::Idle,
            status: ConnectionStatus::Disconnected,
            app_state: AppState::Active,
            attempts: 0,
            attempt_in_flight: false,
            timer: RetryTimer::new(),
            last_event: None,
            last_error: None,
            history_error: None,
            pending_fetches: 0,
        };
        let task = tokio::spawn(actor.run(signals_rx));

        Self {
            handle: SupervisorHandle {
                signals: signals_tx,
                state: state_rx,
                transport,
                history,
            },
            task: Some(task),
        }
    }

    pub fn handle(&self) -> SupervisorHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.handle.state()
    }

    /// Cancel the retry timer, detach from and disconnect the transport, and
    /// stop the actor.
    pub async fn shutdown(mut self) {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.handle.signal(Signal::Shutdown(Some(reply_tx)));
        let _ = reply_rx.await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("supervisor task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.handle.signal(Signal::Shutdown(None));
        }
    }
}

fn forward_transport_signals(
    transport: &dyn Transport,
    tx: &mpsc::UnboundedSender<Signal>,
) -> Vec<Subscription> {
    let signals = transport.signals();

    let open_tx = tx.clone();
    let event_tx = tx.clone();
    let error_tx = tx.clone();
    let close_tx = tx.clone();
    let status_tx = tx.clone();

    vec![
        signals.open.subscribe(move |_| {
            let _ = open_tx.send(Signal::Opened);
        }),
        signals.event.subscribe(move |event: &BackendEvent| {
            let _ = event_tx.send(Signal::Event(event.clone()));
        }),
        signals.error.subscribe(move |err: &ConnectionError| {
            let _ = error_tx.send(Signal::Error(err.clone()));
        }),
        signals.close.subscribe(move |info: &CloseInfo| {
            let _ = close_tx.send(Signal::Closed(info.clone()));
        }),
        signals.status.subscribe(move |status: &ConnectionStatus| {
            let _ = status_tx.send(Signal::Status(*status));
        }),
    ]
}

struct Actor {
    settings: SupervisorSettings,
    transport: Arc<dyn Transport>,
    history: Arc<dyn HistorySource>,
    signals_tx: mpsc::UnboundedSender<Signal>,
    state_tx: watch::Sender<SupervisorState>,
    subscriptions: Vec<Subscription>,

    phase: SupervisorPhase,
    status: ConnectionStatus,
    app_state: AppState,
    attempts: u32,
    attempt_in_flight: bool,
    timer: RetryTimer,

    buckets: EventBuckets,
    last_event: Option<BackendEvent>,
    last_error: Option<ConnectionError>,
    history_error: Option<String>,
    pending_fetches: usize,
}

impl Actor {
    async fn run(mut self, mut signals: mpsc::UnboundedReceiver<Signal>) {
        info!(
            "supervisor started (max attempts: {}, backoff: {:?})",
            self.settings.max_attempts, self.settings.backoff.kind
        );
        self.attempt();
        self.publish();

        while let Some(signal) = signals.recv().await {
            if let Signal::Shutdown(reply) = signal {
                self.stop();
                self.publish();
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
                break;
            }
            self.handle(signal);
            self.publish();
        }
        debug!("supervisor actor exited");
    }

    fn handle(&mut self, signal: Signal) {
        match signal {
            Signal::Opened => self.on_opened(),
            Signal::Event(event) => self.on_event(event),
            Signal::Error(err) => self.on_error(err),
            Signal::Closed(info) => self.on_closed(info),
            Signal::Status(status) => self.on_status(status),
            Signal::AttemptFinished(result) => self.on_attempt_finished(result),
            Signal::RetryFired(token) => {
                if self.timer.fire(token) {
                    self.attempt();
                }
            }
            Signal::Lifecycle(next) => self.on_lifecycle(next),
            Signal::Refresh => self.start_history_fetch(),
            Signal::RetryNow => self.retry_now(),
            Signal::HistoryLoaded(batch) => self.apply_history(batch),
            Signal::Shutdown(_) => {}
        }
    }

    fn attempt(&mut self) {
        if self.attempt_in_flight {
            debug!("connection attempt already in flight");
            return;
        }
        if self.attempts >= self.settings.max_attempts {
            self.give_up();
            return;
        }

        self.timer.cancel();
        self.attempts += 1;
        self.attempt_in_flight = true;
        self.phase = SupervisorPhase::Attempting;
        info!(
            "connection attempt {}/{}",
            self.attempts, self.settings.max_attempts
        );

        let transport = Arc::clone(&self.transport);
        let tx = self.signals_tx.clone();
        tokio::spawn(async move {
            let result = transport.connect().await;
            let _ = tx.send(Signal::AttemptFinished(result));
        });
    }

    fn schedule_retry(&mut self) {
        let delay = self.settings.backoff.delay(self.attempts.max(1));
        info!("reconnecting in {:.1}s", delay.as_secs_f64());
        let tx = self.signals_tx.clone();
        self.timer.arm(delay, move |token| {
            let _ = tx.send(Signal::RetryFired(token));
        });
    }

    fn give_up(&mut self) {
        self.timer.cancel();
        self.phase = SupervisorPhase::Failed;
        self.status = ConnectionStatus::Error;
        let err = ConnectionError::MaxAttemptsExceeded {
            attempts: self.attempts,
        };
        error!("{err}, giving up until a manual retry");
        self.last_error = Some(err);
    }

    fn on_opened(&mut self) {
        info!("connected after {} attempt(s)", self.attempts);
        self.timer.cancel();
        self.phase = SupervisorPhase::Connected;
        self.status = ConnectionStatus::Connected;
        self.attempts = 0;
        self.last_error = None;
        self.start_history_fetch();
    }

    fn on_event(&mut self, event: BackendEvent) {
        let kind = self.buckets.push(event.clone());
        debug!("event {} added to {kind}", event.id);
        self.last_event = Some(event);
    }

    fn on_error(&mut self, err: ConnectionError) {
        if err.is_per_message() {
            debug!("message error: {err}");
        } else {
            warn!("connection error: {err}");
        }
        // The terminal error stays visible until a manual retry.
        if self.phase != SupervisorPhase::Failed {
            self.last_error = Some(err);
        }
    }

    fn on_status(&mut self, status: ConnectionStatus) {
        if matches!(
            self.phase,
            SupervisorPhase::Failed | SupervisorPhase::Stopped
        ) {
            return;
        }
        self.status = status;
    }

    fn on_closed(&mut self, info: CloseInfo) {
        if self.phase != SupervisorPhase::Connected {
            debug!("ignoring close (code {}) in phase {}", info.code, self.phase);
            return;
        }
        info!(
            "connection closed (code {}, clean: {})",
            info.code, info.was_clean
        );
        self.phase = SupervisorPhase::Disconnected;
        self.status = ConnectionStatus::Disconnected;

        if self.app_state.is_foreground() {
            self.schedule_retry();
        } else {
            info!("app in {}, reconnect deferred to foreground", self.app_state);
        }
    }

    fn on_attempt_finished(&mut self, result: Result<(), ConnectionError>) {
        self.attempt_in_flight = false;
        let err = match result {
            Ok(()) => return,
            Err(ConnectionError::AlreadyConnecting) => {
                debug!("transport reported an attempt already in progress");
                return;
            }
            Err(err) => err,
        };
        if self.phase != SupervisorPhase::Attempting {
            return;
        }

        warn!(
            "connection attempt {}/{} failed: {err}",
            self.attempts, self.settings.max_attempts
        );
        if self.attempts < self.settings.max_attempts {
            self.phase = SupervisorPhase::Disconnected;
            self.schedule_retry();
        } else {
            self.give_up();
        }
    }

    fn on_lifecycle(&mut self, next: AppState) {
        let previous = self.app_state;
        self.app_state = next;
        debug!("app state: {previous} -> {next}");

        if !previous.enters_foreground(next) {
            return;
        }
        if matches!(
            self.phase,
            SupervisorPhase::Failed | SupervisorPhase::Stopped
        ) {
            return;
        }
        if self.transport.is_connected() || self.timer.is_armed() || self.attempt_in_flight {
            return;
        }
        info!("back in foreground without a connection, reconnecting");
        self.attempt();
    }

    fn retry_now(&mut self) {
        if self.phase == SupervisorPhase::Connected || self.attempt_in_flight {
            debug!("manual retry ignored in phase {}", self.phase);
            return;
        }
        info!("manual retry requested");
        self.attempts = 0;
        self.phase = SupervisorPhase::Disconnected;
        self.status = self.transport.status();
        self.attempt();
    }

    fn start_history_fetch(&mut self) {
        self.pending_fetches += 1;
        let mark = self.buckets.mark();
        let history = Arc::clone(&self.history);
        let tx = self.signals_tx.clone();
        tokio::spawn(async move {
            let (events, insights) =
                tokio::join!(history.fetch_events(), history.fetch_insights());
            let _ = tx.send(Signal::HistoryLoaded(HistoryBatch {
                mark,
                events,
                insights,
            }));
        });
    }

    fn apply_history(&mut self, batch: HistoryBatch) {
        self.pending_fetches = self.pending_fetches.saturating_sub(1);
        self.history_error = None;

        match batch.events {
            Ok(events) => {
                debug!("loaded {} historical events", events.len());
                self.buckets
                    .merge_history(BucketKind::Events, batch.mark, events);
            }
            Err(e) => {
                warn!("failed to fetch historical events: {e}");
                self.history_error = Some(e.to_string());
            }
        }
        match batch.insights {
            Ok(insights) => {
                debug!("loaded {} historical insights", insights.len());
                self.buckets
                    .merge_history(BucketKind::Insights, batch.mark, insights);
            }
            Err(e) => {
                warn!("failed to fetch historical insights: {e}");
                self.history_error = Some(e.to_string());
            }
        }
    }

    fn stop(&mut self) {
        info!("supervisor shutting down");
        self.timer.cancel();
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.transport.disconnect();
        self.phase = SupervisorPhase::Stopped;
        self.status = ConnectionStatus::Disconnected;
    }

    fn publish(&self) {
        self.state_tx.send_replace(SupervisorState {
            phase: self.phase,
            status: self.status,
            is_connected: self.status == ConnectionStatus::Connected,
            events: self.buckets.events().iter().cloned().collect(),
            insights: self.buckets.insights().iter().cloned().collect(),
            last_event: self.last_event.clone(),
            last_error: self.last_error.clone(),
            history_error: self.history_error.clone(),
            is_loading: self.pending_fetches > 0,
            connection_attempts: self.attempts,
            app_state: self.app_state,
        });
    }
}
