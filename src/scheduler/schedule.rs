//! Daily refresh boundaries
//!
//! A selection made at time `t` stays current until the *next load time*:
//! local midnight of the calendar day after `t`, plus a fixed offset (two
//! hours by default). The offset keeps the boundary clear of the date change
//! itself and of the early-morning hours where DST transitions happen.
//!
//! The offset is elapsed time from the start of the day, so on a DST
//! transition day the wall-clock time of the boundary can differ from the
//! offset (00:00 EST + 2h is 03:00 EDT on a spring-forward day).

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{SchedulerError, SchedulerResult};

/// Default offset into the day of the refresh boundary
pub const DEFAULT_DAY_OFFSET_MINUTES: u32 = 120;

/// Default period between refreshes once the first boundary has passed
pub const DEFAULT_PERIOD: std::time::Duration = std::time::Duration::from_secs(24 * 3600);

/// Next load time for `t` in its own timezone
pub fn next_load_time<Tz2: TimeZone>(t: &DateTime<Tz2>, offset: Duration) -> DateTime<Tz2> {
    let tz = t.timezone();
    let Some(next_day) = t.date_naive().succ_opt() else {
        return t.clone() + Duration::days(1);
    };

    start_of_day(&tz, next_day.and_time(NaiveTime::MIN)) + offset
}

/// First instant of a local day
///
/// An ambiguous midnight resolves to the earlier instant; a midnight that
/// falls in a DST gap moves forward to the first valid hour.
fn start_of_day<Tz2: TimeZone>(tz: &Tz2, midnight: NaiveDateTime) -> DateTime<Tz2> {
    (0..=3)
        .find_map(|h| {
            tz.from_local_datetime(&(midnight + Duration::hours(h)))
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
}

// ============================================================================
// Refresh Timezone
// ============================================================================

/// Timezone whose calendar days define refresh boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshTimezone {
    /// The process's local timezone
    #[default]
    Local,

    /// A named IANA timezone
    Named(Tz),
}

impl RefreshTimezone {
    /// Next load time for a UTC instant, evaluated in this timezone
    pub fn next_load_time(&self, t: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
        match self {
            Self::Local => {
                next_load_time(&t.with_timezone(&chrono::Local), offset).with_timezone(&Utc)
            }
            Self::Named(tz) => next_load_time(&t.with_timezone(tz), offset).with_timezone(&Utc),
        }
    }
}

impl FromStr for RefreshTimezone {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        s.parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| SchedulerError::invalid_timezone(s))
    }
}

impl fmt::Display for RefreshTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

impl Serialize for RefreshTimezone {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RefreshTimezone {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Refresh Schedule
// ============================================================================

/// When refresh cycles run
#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    /// Calendar used for day boundaries
    pub timezone: RefreshTimezone,

    /// Elapsed time after local midnight
    pub day_offset: Duration,

    /// Period of the recurring refresh after the first boundary
    pub period: std::time::Duration,

    /// Recompute the boundary after every cycle instead of a fixed period
    pub realign_daily: bool,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            timezone: RefreshTimezone::Local,
            day_offset: Duration::minutes(i64::from(DEFAULT_DAY_OFFSET_MINUTES)),
            period: DEFAULT_PERIOD,
            realign_daily: false,
        }
    }
}

impl RefreshSchedule {
    /// Create a schedule, validating the offset
    pub fn new(timezone: RefreshTimezone, day_offset_minutes: u32) -> SchedulerResult<Self> {
        let schedule = Self {
            timezone,
            day_offset: Duration::minutes(i64::from(day_offset_minutes)),
            ..Default::default()
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn with_period(mut self, period: std::time::Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_realign_daily(mut self, realign: bool) -> Self {
        self.realign_daily = realign;
        self
    }

    /// Validate the schedule
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.day_offset < Duration::zero() || self.day_offset >= Duration::hours(24) {
            return Err(SchedulerError::config(
                "day_offset",
                format!("{} minutes is outside one day", self.day_offset.num_minutes()),
            ));
        }
        if self.period.is_zero() {
            return Err(SchedulerError::config("period", "must be positive"));
        }
        Ok(())
    }

    /// Boundary after which a selection made at `selected_at` is stale
    pub fn next_load_time(&self, selected_at: DateTime<Utc>) -> DateTime<Utc> {
        self.timezone.next_load_time(selected_at, self.day_offset)
    }

    /// Whether a selection made at `selected_at` should be replaced as of `now`
    pub fn is_stale(&self, selected_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now > self.next_load_time(selected_at)
    }

    /// Time to wait from `now` until `target`; zero if already passed
    pub fn delay_until(target: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
        (target - now).to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, Timelike};
    use chrono_tz::America::New_York;
    use proptest::prelude::*;

    fn two_hours() -> Duration {
        Duration::hours(2)
    }

    fn local_midnight(date: NaiveDate) -> DateTime<Tz> {
        New_York
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .earliest()
            .unwrap()
    }

    #[test]
    fn test_next_load_time_ordinary_day() {
        let t = New_York.with_ymd_and_hms(2017, 5, 10, 15, 30, 0).unwrap();
        let next = next_load_time(&t, two_hours());

        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2017, 5, 11).unwrap());
        assert_eq!(next.hour(), 2);
        assert_eq!(next.minute(), 0);
        assert!(next > t);
    }

    #[test]
    fn test_next_load_time_just_before_boundary() {
        let t = New_York.with_ymd_and_hms(2017, 5, 10, 1, 59, 0).unwrap();
        let next = next_load_time(&t, two_hours());
        assert_eq!(next.day(), 11);
        assert_eq!(next.hour(), 2);
    }

    #[test]
    fn test_next_load_time_end_of_year() {
        let t = New_York.with_ymd_and_hms(2016, 12, 31, 23, 59, 59).unwrap();
        let next = next_load_time(&t, two_hours());
        assert_eq!(next.year(), 2017);
        assert_eq!(next.month(), 1);
        assert_eq!(next.day(), 1);
    }

    #[test]
    fn test_next_load_time_spring_forward() {
        // 2024-03-10 02:00 EST jumps to 03:00 EDT
        let t = New_York.with_ymd_and_hms(2024, 3, 9, 22, 0, 0).unwrap();
        let next = next_load_time(&t, two_hours());
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        assert_eq!(next.date_naive(), day);
        assert_eq!(next - local_midnight(day), two_hours());
        assert_eq!(next.hour(), 3);
    }

    #[test]
    fn test_next_load_time_fall_back() {
        // 2024-11-03 02:00 EDT falls back to 01:00 EST
        let t = New_York.with_ymd_and_hms(2024, 11, 2, 12, 0, 0).unwrap();
        let next = next_load_time(&t, two_hours());
        let day = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();

        assert_eq!(next.date_naive(), day);
        assert_eq!(next - local_midnight(day), two_hours());
        assert!(next > t);
    }

    #[test]
    fn test_refresh_timezone_parse() {
        assert_eq!("local".parse::<RefreshTimezone>().unwrap(), RefreshTimezone::Local);
        assert_eq!(
            "America/New_York".parse::<RefreshTimezone>().unwrap(),
            RefreshTimezone::Named(New_York)
        );
        assert!(matches!(
            "Mars/Olympus".parse::<RefreshTimezone>(),
            Err(SchedulerError::InvalidTimezone { .. })
        ));
        assert_eq!(RefreshTimezone::Named(New_York).to_string(), "America/New_York");
    }

    #[test]
    fn test_refresh_timezone_utc_conversion() {
        let tz = RefreshTimezone::Named(New_York);
        // 2017-05-10 23:30 UTC is 19:30 EDT on the 10th
        let t = Utc.with_ymd_and_hms(2017, 5, 10, 23, 30, 0).unwrap();
        let next = tz.next_load_time(t, two_hours());
        // 2017-05-11 02:00 EDT == 06:00 UTC
        assert_eq!(next, Utc.with_ymd_and_hms(2017, 5, 11, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_schedule_validation() {
        assert!(RefreshSchedule::new(RefreshTimezone::Local, 120).is_ok());
        assert!(RefreshSchedule::new(RefreshTimezone::Local, 24 * 60).is_err());

        let zero_period = RefreshSchedule::default().with_period(std::time::Duration::ZERO);
        assert!(zero_period.validate().is_err());
    }

    #[test]
    fn test_is_stale() {
        let schedule = RefreshSchedule {
            timezone: RefreshTimezone::Named(New_York),
            ..Default::default()
        };
        let selected = Utc.with_ymd_and_hms(2017, 5, 10, 12, 0, 0).unwrap();
        let boundary = Utc.with_ymd_and_hms(2017, 5, 11, 6, 0, 0).unwrap();

        assert!(!schedule.is_stale(selected, boundary - Duration::minutes(1)));
        assert!(!schedule.is_stale(selected, boundary));
        assert!(schedule.is_stale(selected, boundary + Duration::minutes(1)));
    }

    #[test]
    fn test_delay_until() {
        let now = Utc::now();
        assert_eq!(
            RefreshSchedule::delay_until(now - Duration::hours(30), now),
            std::time::Duration::ZERO
        );
        assert_eq!(
            RefreshSchedule::delay_until(now + Duration::seconds(90), now),
            std::time::Duration::from_secs(90)
        );
    }

    proptest! {
        #[test]
        fn prop_next_load_time_is_offset_into_following_day(
            secs in 1_420_070_400i64..1_893_456_000i64,
            offset_minutes in 0i64..=180,
        ) {
            let t = Utc.timestamp_opt(secs, 0).unwrap().with_timezone(&New_York);
            let offset = Duration::minutes(offset_minutes);
            let next = next_load_time(&t, offset);
            let following = t.date_naive().succ_opt().unwrap();

            prop_assert!(next > t);
            prop_assert_eq!(next.date_naive(), following);
            prop_assert_eq!(next - local_midnight(following), offset);
        }
    }
}
