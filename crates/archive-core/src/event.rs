//! Field probing and annotation for opaque platform events.
//!
//! Event payload schema depends heavily on the event type, so the helpers
//! here probe the handful of shapes the platform uses instead of
//! deserializing into typed records.

use chrono::DateTime;
use serde_json::Value;

/// Keys added by the archiver carry a trailing underscore so they can never
/// collide with a field the platform sent.
pub const TS_KEY: &str = "ts_";
pub const USER_KEY: &str = "user_";

/// Extracts the channel ID an event belongs to.
///
/// Most events carry `channel` or `channel_id` at the top level; reaction
/// and pin events nest it under `item.channel`.
pub fn channel_id(event: &Value) -> Option<&str> {
    for key in ["channel", "channel_id"] {
        if let Some(id) = event.get(key).and_then(Value::as_str) {
            if !id.is_empty() {
                return Some(id);
            }
        }
    }
    event
        .get("item")
        .and_then(|item| item.get("channel"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Extracts the ID of the user the event was generated by.
pub fn user_id(event: &Value) -> Option<&str> {
    for key in ["user", "user_id"] {
        if let Some(id) = event.get(key).and_then(Value::as_str) {
            if !id.is_empty() {
                return Some(id);
            }
        }
    }
    None
}

/// Adds a human-readable UTC rendering of the event's `ts` field.
///
/// Platform timestamps are strings like `"1712345678.000200"`. Events
/// without a parseable `ts` are left untouched.
pub fn annotate_timestamp(event: &mut Value) {
    let Some(rendered) = event
        .get("ts")
        .and_then(Value::as_str)
        .and_then(|ts| ts.parse::<f64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
        .map(|utc| utc.format("%Y-%m-%d %H:%M:%S").to_string())
    else {
        return;
    };
    if let Some(map) = event.as_object_mut() {
        map.insert(TS_KEY.to_string(), Value::String(rendered));
    }
}

/// Adds the resolved display name of the event's user.
pub fn annotate_user(event: &mut Value, name: &str) {
    if let Some(map) = event.as_object_mut() {
        map.insert(USER_KEY.to_string(), Value::String(name.to_string()));
    }
}
