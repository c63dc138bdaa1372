//! Lenient scalar decoding for change-stream JSON.
//!
//! Timestamps arrive either in their native RFC 3339 form or as integer
//! microseconds since the Unix epoch. INT64 columns arrive as JSON numbers or
//! as decimal strings, since the database encodes INT64 as a string in JSON.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a timestamp, native form first and epoch microseconds second.
/// The result is always UTC.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    match value {
        Value::String(text) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Ok(parsed.with_timezone(&Utc));
            }
            let micros = text
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid timestamp '{text}'"))?;
            from_micros(micros)
        }
        Value::Number(number) => {
            let micros = number
                .as_i64()
                .ok_or_else(|| format!("timestamp {number} is not an integer"))?;
            from_micros(micros)
        }
        other => Err(format!("expected timestamp, found {}", kind(other))),
    }
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, String> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| format!("timestamp {micros}us is out of range"))
}

/// Parse an INT64 carried as a JSON number or a decimal string.
pub fn parse_int64(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| format!("{number} is not a 64-bit integer")),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid integer '{text}'")),
        other => Err(format!("expected integer, found {}", kind(other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `deserialize_with` helper for timestamp fields.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_timestamp(&value).map_err(D::Error::custom)
}

/// `deserialize_with` helper for INT64 fields.
pub fn deserialize_int64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_int64(&value).map_err(D::Error::custom)
}
