//! Shared helpers for supervisor integration tests.
//!
//! Boots throwaway tokio-tungstenite servers on 127.0.0.1 and provides a
//! canned history source.

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, WebSocketStream};

use hw_core::config::ValidationMode;
use hw_core::error::HwResult;
use hw_models::{BackendEvent, NewsArticle};
use hw_services::{
    BackoffPolicy, ConnectionSupervisor, HistorySource, SupervisorHandle, SupervisorSettings,
    SupervisorState,
};
use hw_socket::{EventValidator, SocketTransport};

/// A local socket server. Every accepted connection runs `script`.
pub struct TestServer {
    pub url: String,
    accepted: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn start<F, Fut>(script: F) -> Self
    where
        F: Fn(usize, WebSocketStream<TcpStream>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let index = counter.fetch_add(1, Ordering::SeqCst);
                if let Ok(ws) = accept_async(stream).await {
                    tokio::spawn(script(index, ws));
                }
            }
        });

        Self {
            url: format!("ws://{addr}/live"),
            accepted,
        }
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// A URL on which nothing is listening.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/live")
}

pub fn transport(url: &str) -> Arc<SocketTransport> {
    Arc::new(SocketTransport::new(
        url,
        Duration::from_millis(500),
        EventValidator::new(ValidationMode::Loose),
    ))
}

pub fn settings(max_attempts: u32, retry_ms: u64) -> SupervisorSettings {
    SupervisorSettings {
        max_attempts,
        backoff: BackoffPolicy::fixed(Duration::from_millis(retry_ms)),
        bucket_capacity: 500,
    }
}

/// History source with fixed contents.
#[derive(Default)]
pub struct StaticHistory {
    pub events: Vec<BackendEvent>,
    pub insights: Vec<BackendEvent>,
    pub news: Vec<NewsArticle>,
    pub fetches: AtomicUsize,
}

#[async_trait]
impl HistorySource for StaticHistory {
    async fn fetch_events(&self) -> HwResult<Vec<BackendEvent>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.events.clone())
    }

    async fn fetch_insights(&self) -> HwResult<Vec<BackendEvent>> {
        Ok(self.insights.clone())
    }

    async fn fetch_news(&self) -> HwResult<Vec<NewsArticle>> {
        Ok(self.news.clone())
    }
}

pub fn start_supervisor(
    transport: Arc<SocketTransport>,
    settings: SupervisorSettings,
) -> ConnectionSupervisor {
    ConnectionSupervisor::start(transport, Arc::new(StaticHistory::default()), settings)
}

/// Wait (bounded) until the supervisor state satisfies `predicate`.
pub async fn wait_state(
    handle: &SupervisorHandle,
    predicate: impl FnMut(&SupervisorState) -> bool,
) -> SupervisorState {
    tokio::time::timeout(Duration::from_secs(5), handle.wait_for(predicate))
        .await
        .expect("supervisor state not reached in time")
        .expect("supervisor stopped")
}

/// Wait (bounded) until `condition` holds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
