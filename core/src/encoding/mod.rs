//! Canonical encoding layer
//!
//! Every key and payload persisted to the object store goes through the
//! conversions in this module, because identity of persisted state depends
//! on them bit-for-bit. Provides:
//! - bytes/string/url <-> standard-alphabet base64
//! - datetime/date/time <-> ISO-8601 strings (always UTC, no zone suffix)
//! - UUID creation for drive and PAR identifiers
//! - filepath-part normalisation for hierarchical drive names

use crate::errors::{FedsvcError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use uuid::Uuid;

/// Return a newly created random (v4) uuid as a lowercase hyphenated string.
pub fn create_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Encode binary data to a base64 utf-8 string.
pub fn bytes_to_string(b: &[u8]) -> String {
    BASE64.encode(b)
}

/// Decode base64 back to bytes. Only valid for strings produced by
/// [`bytes_to_string`].
pub fn string_to_bytes(s: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(s.as_bytes())
        .map_err(|e| FedsvcError::Encoding(format!("invalid base64 '{}': {}", s, e)))
}

/// Encode a unicode string to a form that is safe to use as a filename or
/// object-store key.
pub fn string_to_encoded(s: &str) -> String {
    bytes_to_string(s.as_bytes())
}

/// Decode a string encoded via [`string_to_encoded`].
pub fn encoded_to_string(e: &str) -> Result<String> {
    let bytes = string_to_bytes(e)?;
    String::from_utf8(bytes)
        .map_err(|e| FedsvcError::Encoding(format!("encoded value is not utf-8: {}", e)))
}

/// Encode a URL so it is safe to use as a name or key in the object store.
pub fn url_to_encoded(url: &str) -> String {
    string_to_encoded(url)
}

/// Decode a URL encoded via [`url_to_encoded`].
pub fn encoded_to_url(e: &str) -> Result<String> {
    encoded_to_string(e)
}

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const TIME_FORMAT: &str = "%H:%M:%S%.6f";

/// Encode a datetime to a standard ISO-8601 string in UTC. The zone suffix
/// is omitted on write; readers re-tag UTC.
pub fn datetime_to_string(d: DateTime<Utc>) -> String {
    d.format(DATETIME_FORMAT).to_string()
}

/// Decode a datetime from an ISO-8601 string. Input carrying a zone is
/// converted to UTC; input lacking a zone is interpreted as UTC.
///
/// # Example
///
/// ```
/// use fedsvc_core::encoding::{datetime_to_string, string_to_datetime};
///
/// let d = string_to_datetime("2026-03-01T12:00:00").unwrap();
/// assert_eq!(datetime_to_string(d), "2026-03-01T12:00:00.000000");
/// ```
pub fn string_to_datetime(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(zoned) = DateTime::parse_from_rfc3339(s) {
        return Ok(zoned.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| FedsvcError::Encoding(format!("invalid datetime '{}': {}", s, e)))
}

/// Encode a date as a standard ISO-8601 date string.
pub fn date_to_string(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Decode a date encoded via [`date_to_string`].
pub fn string_to_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| FedsvcError::Encoding(format!("invalid date '{}': {}", s, e)))
}

/// Encode a time of day as a standard ISO-8601 time string (UTC).
pub fn time_to_string(t: NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Decode a time encoded via [`time_to_string`]. A time string carrying a
/// non-UTC offset cannot be normalised without a date and is rejected.
pub fn string_to_time(s: &str) -> Result<NaiveTime> {
    let bare = if let Some(stripped) = s.strip_suffix('Z') {
        stripped
    } else if let Some(plus) = s.find('+') {
        if &s[plus + 1..] != "00:00" && &s[plus + 1..] != "0000" && &s[plus + 1..] != "00" {
            return Err(FedsvcError::Encoding(format!(
                "cannot decode the non-UTC time '{}'; convert to UTC first",
                s
            )));
        }
        &s[..plus]
    } else if s.contains('-') {
        // HH:MM:SS contains no '-', so one can only introduce an offset
        return Err(FedsvcError::Encoding(format!(
            "cannot decode the non-UTC time '{}'; convert to UTC first",
            s
        )));
    } else {
        s
    };

    NaiveTime::parse_from_str(bare, "%H:%M:%S%.f")
        .map_err(|e| FedsvcError::Encoding(format!("invalid time '{}': {}", s, e)))
}

/// Return the current UTC time, truncated to microsecond precision so that
/// it round-trips exactly through [`datetime_to_string`].
pub fn get_datetime_now() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(now.timestamp_subsec_micros() * 1_000)
        .unwrap_or(now)
}

/// Convenience: the current UTC time already encoded to a string.
pub fn get_datetime_now_to_string() -> String {
    datetime_to_string(get_datetime_now())
}

/// Minimum distance into the future accepted by [`get_datetime_future`].
pub const MIN_FUTURE_SECONDS: i64 = 5;

/// Return the datetime that is `delta` in the future. Deltas under five
/// seconds are rejected to prevent accidental past or near-now expiries.
pub fn get_datetime_future(delta: Duration) -> Result<DateTime<Utc>> {
    if delta < Duration::seconds(MIN_FUTURE_SECONDS) {
        return Err(FedsvcError::Encoding(format!(
            "the requested delta ({}s) is not sufficiently far into the future",
            delta.num_seconds()
        )));
    }

    Ok(get_datetime_now() + delta)
}

/// Combine a date and a time (midnight if omitted) into a UTC datetime.
pub fn date_and_time_to_datetime(date: NaiveDate, time: Option<NaiveTime>) -> DateTime<Utc> {
    let time = time.unwrap_or_else(|| NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default());
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Serde adaptor that persists datetimes through the canonical string
/// form, for use with `#[serde(with = "crate::encoding::serde_datetime")]`.
pub mod serde_datetime {
    use super::{datetime_to_string, string_to_datetime};
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        d: &DateTime<Utc>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&datetime_to_string(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        string_to_datetime(&s).map_err(D::Error::custom)
    }
}

/// Split a slash-separated path into its normalised components.
///
/// Repeated, leading and trailing separators are collapsed. `.` and `..`
/// components are rejected, as is a path with no components at all.
pub fn string_to_filepath_parts(path: &str) -> Result<Vec<String>> {
    let parts: Vec<String> = path
        .split('/')
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect();

    if parts.is_empty() {
        return Err(FedsvcError::Encoding(format!(
            "'{}' does not contain any path components",
            path
        )));
    }

    for part in &parts {
        if part == "." || part == ".." {
            return Err(FedsvcError::Encoding(format!(
                "'{}' contains the forbidden path component '{}'",
                path, part
            )));
        }
    }

    Ok(parts)
}
