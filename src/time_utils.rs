// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer};

/// Format written by older app builds ("yyyy-MM-dd HH:mm:ss", device clock, no zone).
const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
///
/// Accepts RFC3339 and the legacy zone-less format (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, LEGACY_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serde field helper for optional timestamps in stored documents.
///
/// Native Firestore timestamps arrive as RFC3339 strings; older builds
/// wrote the legacy format. Anything else is a decode error rather than a
/// silently missing time.
pub fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_round_trip_rfc3339() {
        let t = Utc.with_ymd_and_hms(2025, 1, 31, 22, 5, 0).unwrap();
        let s = format_utc_rfc3339(t);
        assert_eq!(s, "2025-01-31T22:05:00.000Z");
        assert_eq!(parse_timestamp(&s), Some(t));
    }

    #[test]
    fn test_parse_legacy_format() {
        let parsed = parse_timestamp("2025-02-01 09:30:15").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 2, 1, 9, 30, 15).unwrap());
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
