//! Time zone helpers shared by extraction, templates and registration edits.
//!
//! All user-facing times are interpreted and rendered in a single school time
//! zone (Europe/Berlin by default); storage is always UTC.

use chrono::{DateTime, FixedOffset, Locale, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Long German date/time format, e.g. "Dienstag, 14. Januar 2025 um 18:00".
const LONG_FORMAT: &str = "%A, %-d. %B %Y um %H:%M";

/// Naive layouts accepted when the model omits the UTC offset.
const NAIVE_LAYOUTS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Parses an ISO-8601 timestamp.
///
/// Values carrying an offset are taken as-is. Naive date-times and bare dates
/// are interpreted as local time in `tz`.
pub fn parse_timestamp(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, layout) {
            return from_local(naive, tz);
        }
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    from_local(date.and_hms_opt(0, 0, 0)?, tz)
}

/// Moves an instant to 00:00 of its local calendar day in `tz`.
pub fn local_midnight(instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let day = instant.with_timezone(&tz).date_naive();
    day.and_hms_opt(0, 0, 0)
        .and_then(|midnight| from_local(midnight, tz))
        .unwrap_or(instant)
}

/// Renders an instant as a long German date/time string in `tz`.
pub fn format_long(instant: DateTime<Utc>, tz: Tz) -> String {
    instant
        .with_timezone(&tz)
        .format_localized(LONG_FORMAT, Locale::de_DE)
        .to_string()
}

fn from_local(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Berlin;

    #[test]
    fn parses_offset_timestamps() {
        let parsed = parse_timestamp("2025-01-14T18:00:00+01:00", Berlin).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 14, 17, 0, 0).unwrap());
    }

    #[test]
    fn parses_zulu_timestamps() {
        let parsed = parse_timestamp("2025-01-14T17:00:00Z", Berlin).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 1, 14, 17, 0, 0).unwrap());
    }

    #[test]
    fn naive_timestamps_are_local() {
        let winter = parse_timestamp("2025-01-14T18:00:00", Berlin).unwrap();
        assert_eq!(winter, Utc.with_ymd_and_hms(2025, 1, 14, 17, 0, 0).unwrap());

        let summer = parse_timestamp("2025-07-01T18:00", Berlin).unwrap();
        assert_eq!(summer, Utc.with_ymd_and_hms(2025, 7, 1, 16, 0, 0).unwrap());
    }

    #[test]
    fn bare_dates_are_local_midnight() {
        let parsed = parse_timestamp("2025-03-10", Berlin).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 9, 23, 0, 0).unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_timestamp("next tuesday", Berlin).is_none());
        assert!(parse_timestamp("", Berlin).is_none());
    }

    #[test]
    fn midnight_keeps_local_day() {
        // 23:30 UTC on Jan 14 is already Jan 15 in Berlin.
        let late = Utc.with_ymd_and_hms(2025, 1, 14, 23, 30, 0).unwrap();
        let midnight = local_midnight(late, Berlin);
        assert_eq!(midnight, Utc.with_ymd_and_hms(2025, 1, 14, 23, 0, 0).unwrap());
    }

    #[test]
    fn long_format_is_german() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 14, 17, 0, 0).unwrap();
        assert_eq!(
            format_long(instant, Berlin),
            "Dienstag, 14. Januar 2025 um 18:00"
        );
    }
}
