//! HiveWatch Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other HiveWatch crates:
//! - Application configuration (backend endpoints, connection tuning, device)
//! - The workspace error type and the connection error taxonomy
//! - Structured logging with tracing
//! - Platform directories and common constants

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod platform;

// Re-export commonly used items at the crate root
pub use config::{AppConfig, ConfigHandle};
pub use error::{ConnectionError, HwError, HwResult};
pub use logging::init_logging;
pub use platform::Platform;
