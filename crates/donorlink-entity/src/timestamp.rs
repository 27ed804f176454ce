//! Lenient timestamp parsing for backend payloads.
//!
//! The backend emits a mix of RFC 3339 strings, zone-less local date-times
//! (interpreted as UTC), and epoch milliseconds depending on the endpoint.
//! Every timestamp field in this crate goes through these helpers.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(i64),
}

/// Parse a textual timestamp in any of the accepted forms.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn from_raw<E: serde::de::Error>(raw: RawTimestamp) -> Result<DateTime<Utc>, E> {
    match raw {
        RawTimestamp::Text(text) => parse_timestamp(&text)
            .ok_or_else(|| E::custom(format!("unrecognized timestamp '{text}'"))),
        RawTimestamp::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| E::custom(format!("timestamp out of range: {ms}"))),
    }
}

/// Serde adapter for required timestamps.
pub mod required {
    use super::*;

    /// Serialize as RFC 3339.
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    /// Deserialize from any accepted form.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        from_raw(RawTimestamp::deserialize(deserializer)?)
    }
}

/// Serde adapter for optional timestamps (`null` and absent map to `None`).
pub mod optional {
    use super::*;

    /// Serialize as RFC 3339 or `null`.
    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize from any accepted form or `null`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<RawTimestamp>::deserialize(deserializer)?
            .map(from_raw)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parses_rfc3339_with_offset() {
        let dt = parse_timestamp("2024-03-01T12:00:00+02:00").expect("parse");
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parses_local_datetime_as_utc() {
        let dt = parse_timestamp("2024-03-01T12:00:00.123").expect("parse");
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.nanosecond(), 123_000_000);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
    }
}
