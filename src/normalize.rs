//! Conversion of driver-level values into JSON values.

use crate::types::SqlValue;
use chrono::{DateTime, Datelike, FixedOffset, SecondsFormat, Timelike};
use serde_json::{Map, Number, Value};

/// Normalize a scanned value for JSON output.
///
/// - bytes are decoded as text (lossy for invalid UTF-8)
/// - a zero/unset timestamp becomes `null`, any other timestamp an RFC 3339
///   string with second precision and its UTC offset
/// - everything else passes through unchanged
///
/// Never fails: a float that JSON cannot represent (NaN, infinity) becomes
/// `null` the same way `serde_json` treats it.
pub fn normalize(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Bool(*b),
        SqlValue::Int(v) => Value::from(*v),
        SqlValue::UInt(v) => Value::from(*v),
        SqlValue::Float(v) => Number::from_f64(*v).map_or(Value::Null, Value::Number),
        SqlValue::Text(s) => Value::String(s.clone()),
        SqlValue::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
        SqlValue::Timestamp(None) => Value::Null,
        SqlValue::Timestamp(Some(ts)) if is_zero_time(ts) => Value::Null,
        SqlValue::Timestamp(Some(ts)) => Value::String(format_timestamp(ts)),
        SqlValue::Json(v) => v.clone(),
    }
}

/// Zip column names with normalized values into one JSON object.
pub fn normalize_row(columns: &[String], values: &[SqlValue]) -> Map<String, Value> {
    columns
        .iter()
        .zip(values)
        .map(|(column, value)| (column.clone(), normalize(value)))
        .collect()
}

/// Render a timestamp as RFC 3339, `Z` for UTC.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `0001-01-01T00:00:00` in UTC, the zero value some drivers hand back for
/// unset temporal columns.
fn is_zero_time(ts: &DateTime<FixedOffset>) -> bool {
    let utc = ts.naive_utc();
    utc.year() == 1
        && utc.ordinal() == 1
        && utc.num_seconds_from_midnight() == 0
        && utc.nanosecond() == 0
}
