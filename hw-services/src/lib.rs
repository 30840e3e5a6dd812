//! HiveWatch Services - connection supervision and event aggregation.
//!
//! - `ConnectionSupervisor`: owns the transport, retries failed connections,
//!   reacts to foreground/background changes and aggregates inbound events
//! - `EventBuckets`: bounded newest-first event and insight lists
//! - `RetryTimer`: the single cancellable reconnect timer
//! - `BackoffPolicy`: delay between attempts
//! - `HistorySource`: the REST collaborator used to backfill buckets

pub mod backoff;
pub mod buckets;
pub mod history;
pub mod lifecycle;
pub mod supervisor;
pub mod timer;

pub use backoff::BackoffPolicy;
pub use buckets::{BucketKind, EventBuckets, HistoryMark};
pub use history::HistorySource;
pub use lifecycle::AppState;
pub use supervisor::{
    ConnectionSupervisor, SupervisorHandle, SupervisorPhase, SupervisorSettings, SupervisorState,
};
pub use timer::RetryTimer;
