//! Timestamp helpers for the snapshot store.
//!
//! All database writes are RFC-3339 UTC strings with a `Z` suffix. Bookkeeping
//! stamps (lease expiry, save time) use fixed millisecond precision. Ticket
//! `updated_at` values are compared against live data on every cycle, so they
//! are written with as many fractional digits as they carry.

use anyhow::Context;
use chrono::{DateTime, Utc};

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Format a UTC datetime as an RFC-3339 string without losing precision.
///
/// Fractional seconds are written as 0, 3, 6 or 9 digits, whichever is the
/// shortest exact form.
pub fn to_rfc3339_exact(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_rfc3339_offset_to_utc() {
        let got = parse_ts_to_utc("2024-03-10T09:30:00-05:00").expect("parse");
        let want = Utc.with_ymd_and_hms(2024, 3, 10, 14, 30, 0).unwrap();
        assert_eq!(got, want);
    }

    #[test]
    fn millis_format_round_trips() {
        let dt = parse_ts_to_utc("2024-01-02T03:04:05.678Z").unwrap();
        let s = to_rfc3339_millis(dt);
        assert_eq!(s, "2024-01-02T03:04:05.678Z");
        assert_eq!(parse_ts_to_utc(&s).unwrap(), dt);
    }

    #[test]
    fn exact_format_keeps_sub_millisecond_digits() {
        let micros = parse_ts_to_utc("2024-05-01T12:00:10.123456Z").unwrap();
        assert_eq!(to_rfc3339_exact(micros), "2024-05-01T12:00:10.123456Z");
        assert_eq!(parse_ts_to_utc(&to_rfc3339_exact(micros)).unwrap(), micros);

        let nanos = parse_ts_to_utc("2024-05-01T12:00:10.123456789Z").unwrap();
        assert_eq!(parse_ts_to_utc(&to_rfc3339_exact(nanos)).unwrap(), nanos);

        let whole = parse_ts_to_utc("2024-05-01T12:00:10Z").unwrap();
        assert_eq!(to_rfc3339_exact(whole), "2024-05-01T12:00:10Z");
    }

    #[test]
    fn garbage_is_an_error() {
        let err = parse_ts_to_utc("last tuesday").unwrap_err();
        assert!(err.to_string().contains("bad rfc3339"));
    }
}
