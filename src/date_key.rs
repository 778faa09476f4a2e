// =============================================================================
// Date Normalizer — provider timestamps to calendar-date keys
// =============================================================================
//
// Polygon reports indicator points as integer milliseconds since the epoch and
// news articles as RFC 3339 strings with a trailing `Z`.  Both collapse to a
// `NaiveDate` in a chosen time zone (local time by default).  A `NaiveDate`
// serialises as `YYYY-MM-DD`, which is also its sort order.
// =============================================================================

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Timestamp exactly as the provider sent it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Millis(i64),
    Iso(String),
}

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("cannot parse timestamp '{input}': {source}")]
    Parse {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("millisecond timestamp {0} is out of range")]
    OutOfRange(i64),
}

/// Calendar date of `ts` in the local time zone.
pub fn date_key(ts: &RawTimestamp) -> Result<NaiveDate, TimestampError> {
    date_key_in(ts, &Local)
}

/// Calendar date of `ts` as observed in `tz`.
pub fn date_key_in<Tz: TimeZone>(ts: &RawTimestamp, tz: &Tz) -> Result<NaiveDate, TimestampError> {
    Ok(instant(ts)?.with_timezone(tz).date_naive())
}

/// The absolute instant `ts` refers to.
pub fn instant(ts: &RawTimestamp) -> Result<DateTime<Utc>, TimestampError> {
    match ts {
        RawTimestamp::Millis(ms) => {
            DateTime::from_timestamp_millis(*ms).ok_or(TimestampError::OutOfRange(*ms))
        }
        RawTimestamp::Iso(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|source| TimestampError::Parse {
                input: s.clone(),
                source,
            }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn millis_on_same_day_share_a_key() {
        // 2024-01-01T00:00:00.000Z and 2024-01-01T23:59:59.999Z
        let start = RawTimestamp::Millis(1_704_067_200_000);
        let end = RawTimestamp::Millis(1_704_153_599_999);
        assert_eq!(date_key_in(&start, &Utc).unwrap(), ymd(2024, 1, 1));
        assert_eq!(date_key_in(&end, &Utc).unwrap(), ymd(2024, 1, 1));
    }

    #[test]
    fn millis_across_midnight_split() {
        let before = RawTimestamp::Millis(1_704_153_599_999);
        let after = RawTimestamp::Millis(1_704_153_600_000);
        assert_ne!(
            date_key_in(&before, &Utc).unwrap(),
            date_key_in(&after, &Utc).unwrap()
        );
    }

    #[test]
    fn iso_and_millis_agree() {
        let iso = RawTimestamp::Iso("2024-01-01T15:30:00Z".into());
        let ms = RawTimestamp::Millis(1_704_067_200_000);
        assert_eq!(
            date_key_in(&iso, &Utc).unwrap(),
            date_key_in(&ms, &Utc).unwrap()
        );
    }

    #[test]
    fn zone_shifts_the_calendar_day() {
        let ts = RawTimestamp::Iso("2024-01-01T23:30:00Z".into());
        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(date_key_in(&ts, &east).unwrap(), ymd(2024, 1, 2));
        assert_eq!(date_key_in(&ts, &west).unwrap(), ymd(2024, 1, 1));
    }

    #[test]
    fn local_key_is_stable_within_a_day() {
        // Whatever the host zone is, noon and noon+1h land on the same day.
        let noon = Local.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let later = noon + chrono::Duration::hours(1);
        let a = RawTimestamp::Millis(noon.timestamp_millis());
        let b = RawTimestamp::Iso(later.with_timezone(&Utc).to_rfc3339());
        assert_eq!(date_key(&a).unwrap(), ymd(2024, 3, 5));
        assert_eq!(date_key(&a).unwrap(), date_key(&b).unwrap());
    }

    #[test]
    fn malformed_string_is_an_error() {
        let err = date_key_in(&RawTimestamp::Iso("yesterday".into()), &Utc).unwrap_err();
        assert!(matches!(err, TimestampError::Parse { .. }));
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn out_of_range_millis_is_an_error() {
        let err = date_key_in(&RawTimestamp::Millis(i64::MAX), &Utc).unwrap_err();
        assert!(matches!(err, TimestampError::OutOfRange(_)));
    }

    #[test]
    fn deserialises_both_forms() {
        let ms: RawTimestamp = serde_json::from_str("1704067200000").unwrap();
        let iso: RawTimestamp = serde_json::from_str("\"2024-01-01T00:00:00Z\"").unwrap();
        assert_eq!(ms, RawTimestamp::Millis(1_704_067_200_000));
        assert_eq!(iso, RawTimestamp::Iso("2024-01-01T00:00:00Z".into()));
    }

    #[test]
    fn key_renders_as_plain_date() {
        let key = date_key_in(&RawTimestamp::Millis(1_704_067_200_000), &Utc).unwrap();
        assert_eq!(key.to_string(), "2024-01-01");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2024-01-01\"");
    }
}
