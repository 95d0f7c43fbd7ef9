//! Timestamp derivation for W3C records.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Formats tried, in order, for naive date-times. Values are UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i64,
}

impl Timestamp {
    /// Parse a calendar date-time string.
    ///
    /// Naive values are treated as UTC, which is what W3C extended logs use.
    /// A bare date resolves to midnight. Returns `None` if nothing matches.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();

        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            return Some(Self::from_naive(parsed.naive_utc()));
        }

        for format in NAIVE_FORMATS {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
                return Some(Self::from_naive(parsed));
            }
        }

        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(Self::from_naive)
    }

    /// Derive a record timestamp from a row's `date`/`time` tokens and the
    /// block's `#Date:` directive.
    ///
    /// Priority: row date + row time, then directive date + row time, then
    /// the directive date on its own.
    #[must_use]
    pub fn derive(
        date: Option<&str>,
        time: Option<&str>,
        directive_date: Option<&str>,
    ) -> Option<Self> {
        let candidate = match (date, time, directive_date) {
            (Some(date), Some(time), _) => format!("{date} {time}"),
            (_, Some(time), Some(directive_date)) => {
                let day = directive_date
                    .split_whitespace()
                    .next()
                    .unwrap_or(directive_date);
                format!("{day} {time}")
            }
            (_, _, Some(directive_date)) => directive_date.to_string(),
            _ => return None,
        };

        Self::parse(&candidate)
    }

    fn from_naive(value: NaiveDateTime) -> Self {
        let utc = value.and_utc();
        Self {
            seconds: utc.timestamp(),
            nanos: i64::from(utc.timestamp_subsec_nanos()),
        }
    }
}
