//! Normalization of history records into `BackendEvent`s.
//!
//! The history endpoints are not validated like live frames. Insight records
//! in particular are stored by the backend as `{id, title, description,
//! timestamp}`, so missing fields are filled in before decoding.

use serde_json::Value;
use tracing::warn;

use hw_models::BackendEvent;

/// Decode a list of history records, dropping the ones that cannot be used.
///
/// `default_type` is assigned to records without a `type` field.
pub fn decode_records(records: Vec<Value>, default_type: Option<&str>) -> Vec<BackendEvent> {
    records
        .into_iter()
        .filter_map(|record| decode_record(record, default_type))
        .collect()
}

fn decode_record(mut record: Value, default_type: Option<&str>) -> Option<BackendEvent> {
    let obj = match record.as_object_mut() {
        Some(obj) => obj,
        None => {
            warn!("skipping non-object history record");
            return None;
        }
    };

    if !obj.get("type").is_some_and(Value::is_string) {
        if let Some(kind) = default_type {
            obj.insert("type".into(), Value::String(kind.to_string()));
        }
    }
    if !obj.get("message").is_some_and(Value::is_string) {
        if let Some(title) = obj.get("title").and_then(Value::as_str) {
            let title = title.to_string();
            obj.insert("message".into(), Value::String(title));
        }
    }
    if !obj.get("details").is_some_and(Value::is_string) {
        if let Some(description) = obj.get("description").and_then(Value::as_str) {
            let description = description.to_string();
            obj.insert("details".into(), Value::String(description));
        }
    }

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("<missing>")
        .to_string();
    match serde_json::from_value::<BackendEvent>(record) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("skipping history record {id}: {e}");
            None
        }
    }
}
