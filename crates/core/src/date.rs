//! Lenient date parsing at the data boundary.
//!
//! Upstream exports carry dates in several shapes. Anything that cannot be
//! read becomes `None`; nothing here ever fails a whole item.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::Time;

/// Parse a calendar date from `YYYY-MM-DD` or any timestamp form
/// [`parse_timestamp`] understands (the date part is kept).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    parse_timestamp(raw).map(|t| t.date_naive())
}

/// Parse a timestamp from RFC 3339, the `+0000` offset form some trackers
/// emit, or a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<Time> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

/// Serde adapter for `Option<NaiveDate>` fields that tolerates garbage.
pub mod lenient_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as `YYYY-MM-DD` or `null`.
    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(date) => s.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => s.serialize_none(),
        }
    }

    /// Deserialize any JSON value; non-strings and unparseable strings are `None`.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(d)?;
        Ok(raw
            .as_ref()
            .and_then(|v| v.as_str())
            .and_then(super::parse_date))
    }
}

/// Serde adapter for `Option<Time>` fields that tolerates garbage.
pub mod lenient_timestamp {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::Time;

    /// Serialize as RFC 3339 or `null`.
    pub fn serialize<S: Serializer>(value: &Option<Time>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_str(&t.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    /// Deserialize any JSON value; non-strings and unparseable strings are `None`.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Time>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(d)?;
        Ok(raw
            .as_ref()
            .and_then(|v| v.as_str())
            .and_then(super::parse_timestamp))
    }
}
