//! Commands-log documents
//!
//! `GET /api/v1/digils/{id}/commands-log` returns `pendingCommands` and
//! `sentCommands`. Each entry has a `name` and a `payload`, the payload
//! being either an object or a JSON-encoded string.

use chrono::{DateTime, Utc};
use serde_json::Value;

use digil_types::CommandLog;

use crate::constants::RESET_REGISTER_MARKER;

/// Short label for a logged command: `maintenance ON`, `reset_inclinometro`,
/// `set_value NAME`, or the bare command name
pub fn describe(entry: &Value) -> String {
    let name = entry.get("name").and_then(Value::as_str).unwrap_or("unknown");

    let payload = match entry.get("payload") {
        Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or(Value::Null),
        Some(other) => other.clone(),
        None => Value::Null,
    };

    match name {
        "maintenance" => format!("maintenance {}", param(&payload, "status")),
        "set_value" => {
            let register = param(&payload, "param");
            if register.contains(RESET_REGISTER_MARKER) {
                "reset_inclinometro".to_string()
            } else {
                format!("set_value {}", register)
            }
        }
        other => other.to_string(),
    }
}

/// Parameter value, plain or wrapped in `{"values": [...]}`
fn param(payload: &Value, key: &str) -> String {
    let value = match payload.get(key) {
        Some(Value::Object(wrapped)) => wrapped
            .get("values")
            .and_then(Value::as_array)
            .and_then(|values| values.first()),
        other => other,
    };

    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "?".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Describe every pending and sent command in the document
pub fn parse(document: &Value) -> CommandLog {
    let describe_all = |key: &str| -> Vec<String> {
        document
            .get(key)
            .and_then(Value::as_array)
            .map(|entries| entries.iter().map(describe).collect())
            .unwrap_or_default()
    };

    CommandLog {
        pending: describe_all("pendingCommands"),
        sent: describe_all("sentCommands"),
    }
}

/// `startDate`/`endDate` query values, nanosecond precision
pub fn window_bounds(since: DateTime<Utc>, until: DateTime<Utc>) -> (String, String) {
    (
        since.format("%Y-%m-%dT%H:%M:%S.000000000Z").to_string(),
        until.format("%Y-%m-%dT%H:%M:%S.999999999Z").to_string(),
    )
}
