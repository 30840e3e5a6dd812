//! Envelope for messages sent over the live socket.

use serde::{Deserialize, Serialize};

use crate::frame::FrameData;

/// `{"type": ..., "data": ...}` as sent to the backend in one text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

impl OutboundMessage {
    /// Wrap an already-converted payload.
    pub fn new(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    /// Wrap any serializable payload.
    pub fn from_payload<T: Serialize>(
        kind: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Wrap a camera frame under the `frame` type.
    pub fn frame(frame: &FrameData) -> Result<Self, serde_json::Error> {
        Self::from_payload("frame", frame)
    }

    /// Encode as the JSON text sent on the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_envelope() {
        let frame = FrameData::now("aGl2ZQ==".into(), "cam-1");
        let msg = OutboundMessage::frame(&frame).unwrap();
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "frame");
        assert_eq!(value["data"]["deviceId"], "cam-1");
        assert_eq!(value["data"]["frame"], "aGl2ZQ==");
    }

    #[test]
    fn test_custom_kind() {
        let msg = OutboundMessage::new("ping", serde_json::json!({"seq": 1}));
        assert_eq!(msg.to_json().unwrap(), r#"{"type":"ping","data":{"seq":1}}"#);
    }
}
