//! HiveWatch Socket - live WebSocket connection to the analysis backend.
//!
//! This crate provides the transport layer used by the connection supervisor:
//! - `SocketTransport`: one WebSocket endpoint with connect/disconnect/send,
//!   connection-establishment timeout and status tracking
//! - `EventValidator`: the contract an inbound payload must satisfy before it
//!   is delivered as a `BackendEvent`
//! - `SubscriberRegistry`: callback bookkeeping for open/event/error/close/status

pub mod registry;
pub mod transport;
pub mod validator;

// Re-export key types
pub use registry::{SubscriberRegistry, Subscription};
pub use transport::{CloseInfo, ConnectionStatus, SocketTransport, Transport, TransportSignals};
pub use validator::{is_valid_event, EventValidator};
