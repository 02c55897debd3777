use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::feed::{RawEntry, TimestampField};

/// Result of resolving an entry's timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedTime {
    Utc(DateTime<Utc>),
    Unparseable,
}

impl NormalizedTime {
    pub fn instant(self) -> Option<DateTime<Utc>> {
        match self {
            NormalizedTime::Utc(dt) => Some(dt),
            NormalizedTime::Unparseable => None,
        }
    }
}

/// Formats that carry an explicit offset
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
];

/// Formats without zone information; these are taken as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Resolves the first parseable timestamp of an entry into UTC
#[derive(Debug, Clone)]
pub struct TimeNormalizer {
    fields: Vec<TimestampField>,
}

impl Default for TimeNormalizer {
    fn default() -> Self {
        Self::new(vec![
            TimestampField::Published,
            TimestampField::Updated,
            TimestampField::Created,
        ])
    }
}

impl TimeNormalizer {
    /// Fields are tried in the given order
    pub fn new(fields: Vec<TimestampField>) -> Self {
        Self { fields }
    }

    pub fn normalize(&self, entry: &RawEntry) -> NormalizedTime {
        self.fields
            .iter()
            .filter_map(|field| entry.timestamp(*field))
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .find_map(parse_timestamp)
            .map_or(NormalizedTime::Unparseable, NormalizedTime::Utc)
    }
}

/// Permissive timestamp parser. Values without an offset are assumed to be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // "... 14:03:00 UTC" and "... 14:03:00Z" are common but not RFC 2822
    if let Some(rest) = strip_utc_suffix(raw) {
        let with_offset = format!("{} +0000", rest);
        if let Ok(dt) = DateTime::parse_from_rfc2822(&with_offset) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Some(dt) = parse_naive(rest) {
            return Some(dt);
        }
    }

    for format in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    parse_naive(raw)
}

fn parse_naive(raw: &str) -> Option<DateTime<Utc>> {
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

fn strip_utc_suffix(raw: &str) -> Option<&str> {
    for suffix in [" UTC", " utc", "Z", " Z"] {
        if let Some(rest) = raw.strip_suffix(suffix) {
            let rest = rest.trim_end();
            if !rest.is_empty() {
                return Some(rest);
            }
        }
    }
    None
}
