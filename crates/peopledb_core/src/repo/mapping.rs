//! Helpers shared by entity decoders and binders.
//!
//! # Invariants
//! - Decoders read columns by name, never by ordinal.
//! - Offset-carrying timestamps are stored and read back in UTC.

use crate::repo::error::{RepoError, RepoResult};
use chrono::{DateTime, Datelike, FixedOffset, Offset, SecondsFormat, Utc};
use rusqlite::types::FromSql;
use rusqlite::Row;

/// Reads one named column, reporting lookup or conversion failure as a mapping error.
pub fn column<T: FromSql>(row: &Row<'_>, name: &str) -> RepoResult<T> {
    row.get(name)
        .map_err(|err| RepoError::Mapping(format!("column `{name}`: {err}")))
}

/// The single offset every stored timestamp is normalized to.
pub fn canonical_offset() -> FixedOffset {
    Utc.fix()
}

/// Formats a timestamp for storage as the same instant in UTC.
///
/// # Errors
/// - `Mapping` when the UTC year falls outside 0000..=9999, which RFC 3339
///   text cannot represent and `parse_canonical_timestamp` would reject.
pub fn canonical_timestamp(value: &DateTime<FixedOffset>) -> RepoResult<String> {
    let utc = value.with_timezone(&Utc);
    if !(0..=9999).contains(&utc.year()) {
        return Err(RepoError::Mapping(format!(
            "timestamp {value} is outside the storable years 0000..=9999 in UTC"
        )));
    }
    Ok(utc.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Parses a stored timestamp and normalizes it to the canonical offset.
pub fn parse_canonical_timestamp(text: &str) -> RepoResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text)
        .map(|value| value.with_timezone(&canonical_offset()))
        .map_err(|err| RepoError::Mapping(format!("invalid timestamp `{text}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{canonical_offset, canonical_timestamp, column, parse_canonical_timestamp};
    use crate::repo::error::RepoError;
    use chrono::{FixedOffset, TimeZone};
    use rusqlite::Connection;

    #[test]
    fn canonical_timestamp_converts_to_utc() {
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let value = minus_five.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(canonical_timestamp(&value).unwrap(), "2000-01-01T05:00:00Z");
    }

    #[test]
    fn canonical_timestamp_keeps_sub_second_precision() {
        let plus_nine = FixedOffset::east_opt(9 * 3600).unwrap();
        let value = plus_nine
            .with_ymd_and_hms(2021, 6, 30, 8, 15, 0)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(123_456))
            .unwrap();

        let text = canonical_timestamp(&value).unwrap();
        assert_eq!(text, "2021-06-29T23:15:00.123456Z");
        assert_eq!(parse_canonical_timestamp(&text).unwrap(), value);
    }

    #[test]
    fn canonical_timestamp_rejects_years_rfc3339_cannot_hold() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let far_future = utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            canonical_timestamp(&far_future),
            Err(RepoError::Mapping(_))
        ));

        let before_year_zero = utc.with_ymd_and_hms(-1, 6, 1, 0, 0, 0).unwrap();
        assert!(canonical_timestamp(&before_year_zero).is_err());

        // Local year 9999 that crosses into 10000 once shifted to UTC.
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let crossing = minus_five.with_ymd_and_hms(9999, 12, 31, 22, 0, 0).unwrap();
        assert!(canonical_timestamp(&crossing).is_err());

        let last_storable = utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        let text = canonical_timestamp(&last_storable).unwrap();
        assert_eq!(parse_canonical_timestamp(&text).unwrap(), last_storable);
    }

    #[test]
    fn parsed_timestamp_uses_canonical_offset() {
        let parsed = parse_canonical_timestamp("1980-11-15T15:15:00-06:00").unwrap();

        assert_eq!(parsed.offset(), &canonical_offset());
        assert_eq!(parsed.to_rfc3339(), "1980-11-15T21:15:00+00:00");
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = parse_canonical_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, RepoError::Mapping(_)));
    }

    #[test]
    fn column_reports_unknown_name_as_mapping_failure() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 1 AS present", [], |row| {
                Ok(column::<i64>(row, "absent"))
            })
            .unwrap()
            .unwrap_err();

        match err {
            RepoError::Mapping(message) => assert!(message.contains("absent")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
