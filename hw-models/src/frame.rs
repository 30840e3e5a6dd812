//! Camera frames streamed to the backend.

use serde::{Deserialize, Serialize};

/// A single captured image, sent to the backend for analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameData {
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Base64-encoded image payload.
    pub frame: String,
    /// Identifier of the capturing device.
    pub device_id: String,
    /// Optional capture metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FrameMetadata>,
}

/// Optional metadata describing a captured frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Image format, e.g. "jpeg".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
}

/// Where a frame was captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl FrameData {
    /// Build a frame stamped with the current time.
    pub fn now(frame: String, device_id: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            frame,
            device_id: device_id.into(),
            metadata: None,
        }
    }

    /// Attach metadata to the frame.
    pub fn with_metadata(mut self, metadata: FrameMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wire_shape() {
        let frame = FrameData {
            timestamp: 1_700_000_000_000,
            frame: "aGl2ZQ==".into(),
            device_id: "cam-1".into(),
            metadata: Some(FrameMetadata {
                format: Some("jpeg".into()),
                location: Some(GeoLocation {
                    latitude: 44.97,
                    longitude: -93.26,
                }),
                ..Default::default()
            }),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["deviceId"], "cam-1");
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
        assert_eq!(value["metadata"]["format"], "jpeg");
        assert_eq!(value["metadata"]["location"]["latitude"], 44.97);
        assert!(value["metadata"].get("width").is_none());
    }

    #[test]
    fn test_frame_now_without_metadata() {
        let frame = FrameData::now("abc".into(), "cam-2");
        assert!(frame.timestamp > 0);
        let value = serde_json::to_value(&frame).unwrap();
        assert!(value.get("metadata").is_none());
    }
}
