//! HiveWatch API - HTTP client for the backend's history endpoints.
//!
//! Plain request/response access to `/events`, `/insights` and `/news`.
//! Requests are not retried; the connection supervisor re-fetches history
//! on every successful (re)connection.

pub mod client;
pub mod normalize;

pub use client::ApiClient;
