use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, UtcOffset};

/// Storage format of catalog timestamps, e.g. `2023-05-01 10:20:30.123456+00:00`.
const STORED: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:6][offset_hour sign:mandatory]:[offset_minute]"
);
/// Older rows omit the fractional seconds.
const STORED_LENIENT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]][offset_hour sign:mandatory]:[offset_minute]"
);

pub(crate) fn format(value: OffsetDateTime) -> Result<String> {
    value
        .to_offset(UtcOffset::UTC)
        .format(STORED)
        .or_raise(|| ErrorKind::InvalidData("last_modified"))
}

pub(crate) fn parse(value: &str) -> Result<OffsetDateTime> {
    let normalized = value.trim().replacen('T', " ", 1);
    OffsetDateTime::parse(&normalized, STORED_LENIENT).or_raise(|| ErrorKind::InvalidData("last_modified"))
}

/// Whether the catalog's last-modified time should be moved forward to the
/// source file's.
///
/// Only fires when the file is newer than the stored value by more than
/// `tolerance`. A stored value that is newer, or within tolerance, is left
/// alone.
pub fn needs_correction(stored: OffsetDateTime, file: OffsetDateTime, tolerance: Duration) -> bool {
    file - stored > tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    const TOLERANCE: Duration = Duration::minutes(180);

    #[rstest]
    #[case(Duration::hours(5), true)]
    #[case(Duration::minutes(1), false)]
    #[case(Duration::minutes(180), false)]
    #[case(Duration::minutes(181), true)]
    #[case(Duration::hours(-5), false)]
    fn test_needs_correction(#[case] file_ahead_by: Duration, #[case] expected: bool) {
        let stored = datetime!(2024-06-01 12:00 UTC);
        assert_eq!(needs_correction(stored, stored + file_ahead_by, TOLERANCE), expected);
    }

    #[rstest]
    #[case("2023-05-01 10:20:30.123456+00:00", datetime!(2023-05-01 10:20:30.123456 UTC))]
    #[case("2023-05-01T10:20:30+00:00", datetime!(2023-05-01 10:20:30 UTC))]
    #[case("2023-05-01 12:20:30+02:00", datetime!(2023-05-01 10:20:30 UTC))]
    fn test_parse(#[case] input: &str, #[case] expected: OffsetDateTime) {
        assert_eq!(parse(input).unwrap(), expected);
    }

    #[test]
    fn test_format_is_utc_with_microseconds() {
        let value = datetime!(2023-05-01 12:20:30.5 +02:00);
        assert_eq!(format(value).unwrap(), "2023-05-01 10:20:30.500000+00:00");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("last tuesday").is_err());
    }
}
