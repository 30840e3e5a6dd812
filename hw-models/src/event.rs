//! Events produced by the analysis backend.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Kind of a backend event.
///
/// The backend may introduce new kinds before the client knows about them;
/// those are carried as `Other` instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// A potential predator was detected near the hive (`predator`).
    Predator,
    /// Routine activity report (`normal_activity`).
    NormalActivity,
    /// Backend status message (`system`).
    System,
    /// Aggregated analysis result (`insight`).
    Insight,
    /// Unknown kind, kept verbatim.
    Other(String),
}

impl EventType {
    /// Parse an event type string from the backend.
    pub fn parse(s: &str) -> Self {
        match s {
            "predator" => Self::Predator,
            "normal_activity" => Self::NormalActivity,
            "system" => Self::System,
            "insight" => Self::Insight,
            other => Self::Other(other.to_string()),
        }
    }

    /// Convert to the wire string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Predator => "predator",
            Self::NormalActivity => "normal_activity",
            Self::System => "system",
            Self::Insight => "insight",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Whether this is one of the kinds the client knows about.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// All known wire names.
    pub fn known_names() -> &'static [&'static str] {
        &["predator", "normal_activity", "system", "insight"]
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a severity wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Wire name of this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event pushed by the backend over the live socket or served by the
/// history endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendEvent {
    /// Unique event id.
    pub id: String,
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// ISO-8601 time the event occurred.
    pub timestamp: String,
    /// Human-readable summary. Empty when absent or not a string.
    #[serde(default, deserialize_with = "lenient_message")]
    pub message: String,
    /// Optional longer description.
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Optional image related to the event.
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Opaque structured payload, mostly used by insights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Explicit severity, when the backend provides a known one.
    #[serde(default, deserialize_with = "lenient_severity", skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

// Optional fields are not checked on the live socket, so a wrong shape there
// must not make the whole event undecodable.

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

fn lenient_message<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

fn lenient_severity<'de, D>(deserializer: D) -> Result<Option<Severity>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.and_then(|s| Severity::parse(&s)))
}

impl BackendEvent {
    /// Whether this event belongs in the insights bucket.
    pub fn is_insight(&self) -> bool {
        self.event_type == EventType::Insight
    }

    /// Severity for display: the explicit one, or one derived from the kind.
    ///
    /// Predators are critical; system messages are high when they report an
    /// error or failure and medium otherwise; everything else is low.
    pub fn effective_severity(&self) -> Severity {
        if let Some(severity) = self.severity {
            return severity;
        }
        match self.event_type {
            EventType::Predator => Severity::Critical,
            EventType::System => {
                let message = self.message.to_lowercase();
                if message.contains("error") || message.contains("fail") {
                    Severity::High
                } else {
                    Severity::Medium
                }
            }
            _ => Severity::Low,
        }
    }

    /// Parse the timestamp, accepting RFC 3339 and offset-less ISO-8601.
    pub fn parsed_timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Parse an ISO-8601 timestamp as sent by the backend.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: EventType, message: &str) -> BackendEvent {
        BackendEvent {
            id: "evt-1".into(),
            event_type,
            timestamp: "2025-01-01T00:00:00Z".into(),
            message: message.into(),
            details: None,
            image_url: None,
            data: None,
            severity: None,
        }
    }

    #[test]
    fn test_event_type_parsing() {
        assert_eq!(EventType::parse("predator"), EventType::Predator);
        assert_eq!(EventType::parse("normal_activity"), EventType::NormalActivity);
        assert_eq!(EventType::parse("insight"), EventType::Insight);
        assert_eq!(
            EventType::parse("swarm_warning"),
            EventType::Other("swarm_warning".into())
        );
        assert!(!EventType::parse("swarm_warning").is_known());
        for name in EventType::known_names() {
            assert_eq!(EventType::parse(name).as_str(), *name);
        }
    }

    #[test]
    fn test_decode_backend_event() {
        let event: BackendEvent = serde_json::from_value(serde_json::json!({
            "id": "1",
            "type": "predator",
            "timestamp": "2025-01-01T00:00:00Z",
            "message": "Bear detected",
            "details": null,
            "imageUrl": "https://example.com/bear.jpg",
            "severity": "critical"
        }))
        .unwrap();
        assert_eq!(event.event_type, EventType::Predator);
        assert_eq!(event.details, None);
        assert_eq!(event.image_url.as_deref(), Some("https://example.com/bear.jpg"));
        assert_eq!(event.severity, Some(Severity::Critical));
    }

    #[test]
    fn test_decode_minimal_event() {
        let event: BackendEvent = serde_json::from_str(
            r#"{"id":"2","type":"hive_opened","timestamp":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(event.message, "");
        assert_eq!(event.event_type, EventType::Other("hive_opened".into()));
        assert!(!event.is_insight());
    }

    #[test]
    fn test_decode_tolerates_odd_optional_fields() {
        let event: BackendEvent = serde_json::from_value(serde_json::json!({
            "id": "3",
            "type": "system",
            "timestamp": "t",
            "message": null,
            "details": ["not", "text"],
            "imageUrl": 42,
            "severity": "urgent"
        }))
        .unwrap();
        assert_eq!(event.message, "");
        assert_eq!(event.details, None);
        assert_eq!(event.image_url, None);
        assert_eq!(event.severity, None);
        assert_eq!(event.effective_severity(), Severity::Medium);

        let event: BackendEvent = serde_json::from_str(
            r#"{"id":"4","type":"system","timestamp":"t","message":7,"severity":3}"#,
        )
        .unwrap();
        assert_eq!(event.message, "");
        assert_eq!(event.severity, None);
    }

    #[test]
    fn test_encode_uses_wire_names() {
        let mut evt = event(EventType::Insight, "Activity peaked at noon");
        evt.image_url = Some("x".into());
        let value = serde_json::to_value(&evt).unwrap();
        assert_eq!(value["type"], "insight");
        assert_eq!(value["imageUrl"], "x");
        assert!(value.get("details").is_none());
    }

    #[test]
    fn test_effective_severity() {
        assert_eq!(
            event(EventType::Predator, "Hornet").effective_severity(),
            Severity::Critical
        );
        assert_eq!(
            event(EventType::System, "Camera FAILED to start").effective_severity(),
            Severity::High
        );
        assert_eq!(
            event(EventType::System, "Backend restarted").effective_severity(),
            Severity::Medium
        );
        assert_eq!(
            event(EventType::NormalActivity, "Bee count 120").effective_severity(),
            Severity::Low
        );

        let mut explicit = event(EventType::Predator, "Hornet");
        explicit.severity = Some(Severity::Medium);
        assert_eq!(explicit.effective_severity(), Severity::Medium);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2025-01-01T00:00:00Z").is_some());
        assert!(parse_timestamp("2025-05-10T09:30:00+02:00").is_some());
        assert!(parse_timestamp("2025-05-10T09:30:00.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
