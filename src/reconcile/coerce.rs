use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

// Serial 1 is 1900-01-01; serials 60 and above absorb the spreadsheet
// epoch's phantom 1900-02-29.
const SERIAL_MAX: f64 = 2_958_465.0;

/// Decodes a 1900-epoch spreadsheet date serial.
pub(super) fn serial(value: f64) -> Option<NaiveDate> {
    if !value.is_finite() {
        return None;
    }

    let days = value.trunc();
    if !(1.0..=SERIAL_MAX).contains(&days) {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)]
    let days = days as i64;
    let base = if days >= 60 {
        NaiveDate::from_ymd_opt(1899, 12, 30)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 31)
    }?;

    base.checked_add_signed(chrono::Duration::days(days))
}

/// Coerces a cell into a calendar date.
///
/// ISO strings pass through, numbers (and numeric strings) go through the
/// serial decoder, and anything else gets a round of free-text parsing
/// truncated to the date.
pub(super) fn date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(number) => serial(number.as_f64()?),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                return Some(date);
            }
            if let Ok(number) = trimmed.parse::<f64>() {
                return serial(number);
            }
            text_date(trimmed)
        }
        _ => None,
    }
}

fn text_date(trimmed: &str) -> Option<NaiveDate> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(instant.date_naive());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(instant) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(instant.date());
        }
    }

    for format in ["%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    None
}

/// Coerces a cell into a boolean, `None` when unrecognized.
#[allow(clippy::float_cmp)] // zero is exactly representable
pub(super) fn yes_no(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Some(true),
            "no" | "n" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Coerces a cell into a cost amount. Negative or non-numeric is absent.
pub(super) fn amount(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()
        }
        _ => None,
    }?;

    (number.is_finite() && number >= 0.0).then_some(number)
}

/// Coerces a cell into optional free text. Non-strings are absent.
pub(super) fn optional_text(value: &Value) -> Option<String> {
    let Value::String(text) = value else {
        return None;
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Coerces a cell into a required display string: stringified, trimmed,
/// internal whitespace collapsed. Empty is absent.
pub(super) fn required_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => collapse(text),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
