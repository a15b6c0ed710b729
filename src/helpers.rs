use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use super::error::ConversionError;

/// January 1, 1970 expressed in directory ticks
pub const EPOCH_AS_FILETIME: u64 = 116_444_736_000_000_000;

/// A directory tick is 100ns
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Converts from a directory filetime to a Datetime
///
/// Directory filetimes count the number of 100ns intervals since 1601-01-01.
/// Values from before the unix epoch are rejected since the directory uses
/// them (and `0`) as "never" markers rather than as real dates.
pub fn filetime_to_datetime(file_time: u64) -> Result<DateTime<Utc>, ConversionError> {
    let invalid = || ConversionError::InvalidTimestamp(file_time.to_string());
    let since_unix = file_time.checked_sub(EPOCH_AS_FILETIME).ok_or_else(invalid)?;
    let secs = (since_unix / TICKS_PER_SECOND) as i64;
    let nanos = ((since_unix % TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos).ok_or_else(invalid)
}

/// Parses the textual attribute value the directory hands out
pub fn parse_filetime(raw: &str) -> Result<(u64, DateTime<Utc>), ConversionError> {
    let file_time: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConversionError::InvalidTimestamp(raw.to_owned()))?;
    Ok((file_time, filetime_to_datetime(file_time)?))
}

/// Conversion of calendar values into directory ticks.
///
/// Only whole seconds are encoded. Values without an offset are taken as UTC
/// and bare dates mean midnight UTC.
pub trait ToFiletime {
    fn to_filetime(&self) -> Result<u64, ConversionError>;
}

impl<Tz: TimeZone> ToFiletime for DateTime<Tz> {
    fn to_filetime(&self) -> Result<u64, ConversionError> {
        let ticks = self
            .timestamp()
            .checked_mul(TICKS_PER_SECOND as i64)
            .and_then(|t| t.checked_add(EPOCH_AS_FILETIME as i64))
            .ok_or(ConversionError::OutOfRange)?;
        u64::try_from(ticks).map_err(|_| ConversionError::OutOfRange)
    }
}

impl ToFiletime for NaiveDateTime {
    fn to_filetime(&self) -> Result<u64, ConversionError> {
        self.and_utc().to_filetime()
    }
}

impl ToFiletime for NaiveDate {
    fn to_filetime(&self) -> Result<u64, ConversionError> {
        self.and_time(NaiveTime::default()).to_filetime()
    }
}

#[cfg(test)]
mod date_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(133596792000000000, DateTime::<Utc>::from_timestamp_nanos(1715205600000000000))]
    #[case(116444736000000000, DateTime::<Utc>::from_timestamp_nanos(0))]
    #[case(116444736010000000, DateTime::<Utc>::from_timestamp_nanos(1_000_000_000))]
    #[case(116444736000000001, DateTime::<Utc>::from_timestamp_nanos(100))]
    fn conversion(#[case] input: u64, #[case] expected: DateTime<Utc>) {
        assert_eq!(filetime_to_datetime(input), Ok(expected))
    }

    #[rstest]
    #[case(0)]
    #[case(103821696000000000)]
    #[case(EPOCH_AS_FILETIME - 1)]
    fn rejects_values_before_unix_epoch(#[case] input: u64) {
        assert_eq!(
            filetime_to_datetime(input),
            Err(ConversionError::InvalidTimestamp(input.to_string()))
        );
    }

    #[rstest]
    #[case("133596792000000000", true)]
    #[case(" 133596792000000000\n", true)]
    #[case("0", false)]
    #[case("", false)]
    #[case("never", false)]
    #[case("-5", false)]
    fn parse(#[case] raw: &str, #[case] ok: bool) {
        assert_eq!(parse_filetime(raw).is_ok(), ok);
    }

    #[test]
    fn unix_epoch_encodes_to_offset() {
        let epoch = DateTime::<Utc>::from_timestamp(0, 0).expect("valid");
        assert_eq!(epoch.to_filetime(), Ok(EPOCH_AS_FILETIME));
    }

    #[test]
    fn sub_seconds_are_truncated() {
        let t = DateTime::<Utc>::from_timestamp(1, 999_999_999).expect("valid");
        assert_eq!(t.to_filetime(), Ok(EPOCH_AS_FILETIME + TICKS_PER_SECOND));
    }

    #[test]
    fn naive_values_are_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 8).expect("valid");
        let naive = date.and_hms_opt(22, 0, 0).expect("valid");
        assert_eq!(naive.to_filetime(), Ok(133596792000000000));
        assert_eq!(
            date.to_filetime(),
            Ok(133596792000000000 - 22 * 3600 * TICKS_PER_SECOND)
        );
    }

    #[test]
    fn offsets_are_honoured() {
        let t = DateTime::parse_from_rfc3339("2024-05-09T00:00:00+02:00").expect("valid");
        assert_eq!(t.to_filetime(), Ok(133596792000000000));
    }

    #[test]
    fn dates_before_1601_are_out_of_range() {
        let date = NaiveDate::from_ymd_opt(1600, 12, 31).expect("valid");
        assert_eq!(date.to_filetime(), Err(ConversionError::OutOfRange));
    }

    #[rstest]
    #[case(0)]
    #[case(1715205600)]
    #[case(4102444799)]
    #[case(253402300799)]
    fn round_trip(#[case] secs: i64) {
        let t = DateTime::<Utc>::from_timestamp(secs, 0).expect("valid");
        let ticks = t.to_filetime().expect("in range");
        assert_eq!(filetime_to_datetime(ticks), Ok(t));
    }
}
