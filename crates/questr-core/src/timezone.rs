use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Validate IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<(), CoreError> {
    parse_timezone(timezone).map(|_| ())
}

/// Parse an IANA timezone name into a `Tz`
pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone)
        .map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// The local calendar date of `at_time` in `tz`.
///
/// Quest days are identified by this date, never by a raw timestamp, so a
/// completion at 23:30 local time counts for that local day even when the UTC
/// date has already moved on.
pub fn local_date(at_time: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at_time.with_timezone(tz).date_naive()
}

/// Signed number of calendar days from `from` to `to`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// The calendar day before `date`.
pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_timezone() {
        assert!(validate_timezone("UTC").is_ok());
        assert!(validate_timezone("America/New_York").is_ok());
        assert!(validate_timezone("Invalid/Timezone").is_err());
    }

    #[test]
    fn test_local_date_crosses_utc_midnight() {
        // 02:30 UTC on the 2nd is still the evening of the 1st in New York.
        let instant = Utc.with_ymd_and_hms(2024, 3, 2, 2, 30, 0).unwrap();
        let tz = parse_timezone("America/New_York").unwrap();
        assert_eq!(local_date(instant, &tz), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(local_date(instant, &Tz::UTC), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }

    #[test]
    fn test_days_between() {
        let a = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(days_between(a, b), 3);
        assert_eq!(days_between(b, a), -3);
        assert_eq!(previous_day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }
}
