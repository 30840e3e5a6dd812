//! Single-shot reconnect timer.
//!
//! At most one expiry is outstanding: arming aborts the previous task, and
//! every arm gets a fresh token so an expiry that raced with a re-arm or a
//! cancel is recognised as stale and ignored.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Default)]
pub struct RetryTimer {
    token: u64,
    pending: Option<JoinHandle<()>>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_expiry(token)` after `delay`, replacing any pending expiry.
    pub fn arm<F>(&mut self, delay: Duration, on_expiry: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        self.token += 1;
        let token = self.token;
        debug!("retry timer {token} armed for {}ms", delay.as_millis());
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_expiry(token);
        }));
        token
    }

    /// Accept an expiry. Returns false when `token` is stale or the timer was
    /// cancelled in the meantime.
    pub fn fire(&mut self, token: u64) -> bool {
        if token != self.token || self.pending.is_none() {
            debug!("ignoring stale retry timer {token}");
            return false;
        }
        self.pending = None;
        true
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
            debug!("retry timer {} cancelled", self.token);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RetryTimer::new();
        let token = timer.arm(Duration::from_millis(10), move |t| {
            let _ = tx.send(t);
        });
        assert!(timer.is_armed());

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, token);
        assert!(timer.fire(fired));
        assert!(!timer.is_armed());
        assert!(!timer.fire(fired));
    }

    #[tokio::test]
    async fn test_rearm_replaces_pending() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = RetryTimer::new();

        let first_tx = tx.clone();
        let first = timer.arm(Duration::from_millis(30), move |t| {
            let _ = first_tx.send(t);
        });
        let second = timer.arm(Duration::from_millis(10), move |t| {
            let _ = tx.send(t);
        });
        assert_ne!(first, second);

        assert_eq!(rx.recv().await, Some(second));
        // The first task was aborted and its sender dropped with it.
        assert_eq!(rx.recv().await, None);
        assert!(!timer.fire(first));
        assert!(timer.fire(second));
    }

    #[tokio::test]
    async fn test_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut timer = RetryTimer::new();
        let token = timer.arm(Duration::from_millis(10), move |t| {
            let _ = tx.send(t);
        });
        timer.cancel();
        assert!(!timer.is_armed());
        assert_eq!(rx.recv().await, None);
        assert!(!timer.fire(token));
    }
}
