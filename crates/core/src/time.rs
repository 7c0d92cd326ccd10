// SPDX-License-Identifier: MIT

//! Tolerant UTC timestamp parsing and formatting.
//!
//! Records on disk may carry explicit-UTC (`...Z`, `...+00:00`) or naive
//! timestamps from older tooling; naive values are assumed UTC. Writes
//! always emit explicit UTC with a `Z` suffix.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Parse a timestamp, accepting RFC 3339 or naive ISO-8601 (assumed UTC).
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    // Naive inputs: with or without fractional seconds
    let naive = value.trim_end_matches('Z');
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }

    None
}

/// Format a timestamp as ISO-8601 with an explicit `Z` suffix.
pub fn format_utc(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Serde adapter for required `DateTime<Utc>` fields.
///
/// Unparseable values fall back to the current time rather than failing the
/// whole record (matching the loader's log-and-continue posture).
pub mod ts {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format_utc(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        Ok(parse_utc(&raw).unwrap_or_else(Utc::now))
    }
}

/// Serde adapter for optional `DateTime<Utc>` fields.
pub mod ts_opt {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => ser.serialize_some(&format_utc(*dt)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(de)?;
        Ok(raw.as_deref().and_then(parse_utc))
    }
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod tests;
