//! Audit-event stamps and the `--format json` response envelope.
//!
//! Every audit line and every JSON response carries a `ts` in epoch seconds
//! and a ULID `event_id`. The ULID embeds its own millisecond timestamp, so
//! ids sort in the order the events were written.

use crate::core::error::DiamondError;
use serde_json::Value as JsonValue;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Epoch seconds with a `Z` suffix, the `ts` of audit events.
pub fn now_epoch_z() -> String {
    format!("{}Z", epoch_secs())
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// JSON response for one CLI command.
///
/// On success the fields of `outcome` are merged into the top level. On
/// failure `status` is `"error"` and `error` holds the message, so a caller
/// reading stdout sees every outcome in the same shape.
pub fn response_envelope(cmd: &str, outcome: Result<JsonValue, &DiamondError>) -> JsonValue {
    let mut envelope = serde_json::json!({
        "cmd": cmd,
        "ts": now_epoch_z(),
        "event_id": new_event_id(),
    });
    if let Some(fields) = envelope.as_object_mut() {
        match outcome {
            Ok(extra) => {
                fields.insert("status".to_string(), "ok".into());
                if let JsonValue::Object(extra) = extra {
                    fields.extend(extra);
                }
            }
            Err(err) => {
                fields.insert("status".to_string(), "error".into());
                fields.insert("error".to_string(), err.to_string().into());
            }
        }
    }
    envelope
}
