//! Error types for the HiveWatch workspace.
//!
//! Application-level failures are unified into `HwError`. Failures that belong
//! to the live backend connection have their own cloneable `ConnectionError`
//! so they can be fanned out to several subscribers and kept as the last
//! observed error.

use std::time::Duration;

use thiserror::Error;

/// Convenience type alias for Results using HwError.
pub type HwResult<T> = Result<T, HwError>;

/// Unified error type covering all error categories in HiveWatch.
#[derive(Error, Debug)]
pub enum HwError {
    // -- Configuration errors --
    /// Failed to load, parse or validate application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Network errors --
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Backend returned a non-success status.
    #[error("server error (status {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Live socket connection failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for HwError {
    fn from(e: serde_json::Error) -> Self {
        HwError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for HwError {
    fn from(e: toml::de::Error) -> Self {
        HwError::Config(e.to_string())
    }
}

/// Failures of the live backend connection.
///
/// Per-message kinds (`MalformedPayload`, `InvalidEvent`, `NotConnected`,
/// `Serialization`) are only ever reported to error subscribers. Connection
/// kinds (`ConnectionTimeout`, `Transport`) drive reconnection, and
/// `MaxAttemptsExceeded` is terminal for automatic retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// `connect()` was called while another attempt was still in flight.
    #[error("connection attempt already in progress")]
    AlreadyConnecting,

    /// The socket did not open within the establishment timeout.
    #[error("connection timed out after {}ms", .0.as_millis())]
    ConnectionTimeout(Duration),

    /// Underlying transport fault (handshake, read or write failure).
    #[error("transport error: {0}")]
    Transport(String),

    /// An inbound frame could not be decoded as JSON.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// An inbound frame decoded but does not satisfy the event contract.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A send was attempted while the socket is not connected.
    #[error("socket not connected, message dropped")]
    NotConnected,

    /// An outbound payload could not be serialized.
    #[error("failed to serialize outbound message: {0}")]
    Serialization(String),

    /// Every automatic connection attempt failed.
    #[error("failed to connect after {attempts} attempts")]
    MaxAttemptsExceeded {
        /// Number of attempts made before giving up.
        attempts: u32,
    },
}

impl ConnectionError {
    /// Whether this error concerns a single message rather than the connection.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload(_)
                | Self::InvalidEvent(_)
                | Self::NotConnected
                | Self::Serialization(_)
        )
    }

    /// Whether this error ends automatic recovery.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MaxAttemptsExceeded { .. })
    }
}
