use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::Request;

/// Extracts import rows from a JSON payload.
///
/// Accepts a bare array or the export envelope (any object with a
/// `requests` array). Anything else, including unparseable text, is
/// `None`: the import becomes a no-op.
pub(super) fn rows(payload: &str) -> Option<Vec<Value>> {
    let parsed: Value = serde_json::from_str(payload).ok()?;

    match parsed {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("requests") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    version: u32,
    exported_at: DateTime<Utc>,
    requests: &'a [&'a Request],
}

/// Renders records as the versioned JSON export envelope.
pub(super) fn write(
    requests: &[&Request],
    exported_at: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    let envelope = Envelope {
        version: 1,
        exported_at,
        requests,
    };

    let mut out = serde_json::to_string_pretty(&envelope)?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_bare_arrays_and_envelopes() {
        let bare = rows(r#"[{"studentName":"Alice"}]"#).unwrap();
        assert_eq!(bare.len(), 1);

        let envelope = rows(r#"{"version":1,"requests":[{"a":1},{"b":2}]}"#).unwrap();
        assert_eq!(envelope.len(), 2);
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(rows("not json").is_none());
        assert!(rows("42").is_none());
        assert!(rows(r#"{"version":1}"#).is_none());
        assert!(rows(r#"{"requests":"nope"}"#).is_none());
    }

    #[test]
    fn keeps_non_object_items_for_the_caller_to_count() {
        let items = rows(r#"[1, {"studentName":"Alice"}, null]"#).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], json!(1));
    }
}
