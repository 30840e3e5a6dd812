//! HiveWatch Models - data types exchanged with the analysis backend.
//!
//! - `BackendEvent`: detections and insights pushed over the live socket
//!   and served by the REST history endpoints
//! - `FrameData`: camera frames streamed to the backend
//! - `NewsArticle`: articles served by the news endpoint
//! - `OutboundMessage`: the `{type, data}` envelope for outbound frames

pub mod event;
pub mod frame;
pub mod news;
pub mod outbound;

pub use event::{BackendEvent, EventType, Severity};
pub use frame::{FrameData, FrameMetadata, GeoLocation};
pub use news::NewsArticle;
pub use outbound::OutboundMessage;
