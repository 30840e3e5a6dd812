//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "HiveWatch";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default live endpoint for a locally running backend.
pub const DEFAULT_SOCKET_URL: &str = "ws://127.0.0.1:8080/live";

/// Default REST base for a locally running backend.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8080/api";

/// Environment variable overriding the socket URL.
pub const ENV_SOCKET_URL: &str = "HIVEWATCH_SOCKET_URL";

/// Environment variable overriding the REST base URL.
pub const ENV_API_BASE: &str = "HIVEWATCH_API_BASE";

/// Default REST request timeout in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default number of automatic connection attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay between connection attempts in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 3_000;

/// Default socket establishment timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default number of entries retained per event bucket.
pub const DEFAULT_BUCKET_CAPACITY: usize = 500;

/// Default interval between streamed camera frames in milliseconds.
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 500;

/// REST endpoint paths, relative to the API base.
pub mod endpoints {
    pub const EVENTS: &str = "/events";
    pub const INSIGHTS: &str = "/insights";
    pub const NEWS: &str = "/news";
}

