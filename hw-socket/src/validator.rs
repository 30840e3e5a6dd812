//! Inbound event validation.
//!
//! The wire contract for a live event is deliberately small: an object whose
//! `id`, `type` and `timestamp` are strings. `Strict` mode tightens this for
//! deployments that want unknown kinds and malformed timestamps rejected at
//! the edge instead of rendered.

use serde_json::Value;

use hw_core::config::ValidationMode;
use hw_models::event::parse_timestamp;
use hw_models::{EventType, Severity};

const REQUIRED_STRING_FIELDS: [&str; 3] = ["id", "type", "timestamp"];

/// Whether `raw` satisfies the minimal event contract.
///
/// Never panics; any non-object payload is simply invalid.
pub fn is_valid_event(raw: &Value) -> bool {
    match raw.as_object() {
        Some(obj) => REQUIRED_STRING_FIELDS
            .iter()
            .all(|field| obj.get(*field).is_some_and(Value::is_string)),
        None => false,
    }
}

/// Configurable event validator used by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventValidator {
    mode: ValidationMode,
}

impl EventValidator {
    pub fn new(mode: ValidationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Validate `raw`, returning the names of the offending fields on failure.
    pub fn check(&self, raw: &Value) -> Result<(), Vec<String>> {
        let Some(obj) = raw.as_object() else {
            return Err(vec!["<payload is not an object>".to_string()]);
        };

        let mut violations: Vec<String> = REQUIRED_STRING_FIELDS
            .iter()
            .filter(|field| !obj.get(**field).is_some_and(Value::is_string))
            .map(|field| field.to_string())
            .collect();

        if self.mode == ValidationMode::Strict {
            if let Some(kind) = obj.get("type").and_then(Value::as_str) {
                if !EventType::parse(kind).is_known() {
                    violations.push("type".into());
                }
            }
            if let Some(ts) = obj.get("timestamp").and_then(Value::as_str) {
                if parse_timestamp(ts).is_none() {
                    violations.push("timestamp".into());
                }
            }
            match obj.get("severity") {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) if Severity::parse(s).is_some() => {}
                Some(_) => violations.push("severity".into()),
            }
            match obj.get("message") {
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(_) => violations.push("message".into()),
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    pub fn is_valid(&self, raw: &Value) -> bool {
        self.check(raw).is_ok()
    }
}
