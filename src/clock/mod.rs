//! Calendar-day arithmetic and the clock abstraction.
//!
//! Every streak, milestone and rollover decision in the engine is expressed in
//! [`CalendarDay`]s. The only source of "now" is a [`Clock`], so the day
//! boundary policy lives in exactly one place: [`SystemClock`] uses the
//! device-local wall clock, [`ManualClock`] uses UTC and is driven by tests.

use crate::constants::DATE_FORMAT_ISO;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

/// A date with no time-of-day component.
///
/// Serialises as `YYYY-MM-DD`.
///
/// # Examples
///
/// ```
/// use parish::clock::CalendarDay;
///
/// let day: CalendarDay = "2025-01-15".parse().unwrap();
/// assert_eq!(day.to_string(), "2025-01-15");
/// assert_eq!(day.succ().to_string(), "2025-01-16");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    /// Builds a day from its components, returning `None` for impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(CalendarDay)
    }

    /// The underlying chrono date.
    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// The following day.
    pub fn succ(self) -> Self {
        self.offset(1)
    }

    /// The day `days` after (or before, if negative) this one.
    pub fn offset(self, days: i64) -> Self {
        CalendarDay(self.0 + Duration::days(days))
    }
}

impl From<NaiveDate> for CalendarDay {
    fn from(date: NaiveDate) -> Self {
        CalendarDay(date)
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT_ISO))
    }
}

impl FromStr for CalendarDay {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT_ISO).map(CalendarDay)
    }
}

/// Absolute number of days between two calendar days.
///
/// # Examples
///
/// ```
/// use parish::clock::{days_between, CalendarDay};
///
/// let a = CalendarDay::from_ymd(2024, 12, 25).unwrap();
/// let b = CalendarDay::from_ymd(2025, 1, 1).unwrap();
/// assert_eq!(days_between(a, b), 7);
/// assert_eq!(days_between(b, a), 7);
/// ```
pub fn days_between(a: CalendarDay, b: CalendarDay) -> u32 {
    let diff = (b.0 - a.0).num_days().unsigned_abs();
    u32::try_from(diff).unwrap_or(u32::MAX)
}

/// Source of the current instant and of the day boundary policy.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Truncates an instant to its calendar day under this clock's policy.
    fn day_of(&self, timestamp: DateTime<Utc>) -> CalendarDay;

    /// The current calendar day.
    fn today(&self) -> CalendarDay {
        self.day_of(self.now())
    }
}

/// Wall-clock time with device-local day boundaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn day_of(&self, timestamp: DateTime<Utc>) -> CalendarDay {
        CalendarDay(timestamp.with_timezone(&Local).date_naive())
    }
}

/// A clock that only moves when told to. Days are UTC days.
///
/// # Examples
///
/// ```
/// use parish::clock::{CalendarDay, Clock, ManualClock};
///
/// let clock = ManualClock::at_day(CalendarDay::from_ymd(2025, 1, 1).unwrap());
/// clock.advance_days(1);
/// assert_eq!(clock.today().to_string(), "2025-01-02");
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Creates a clock frozen at noon UTC on `day`.
    pub fn at_day(day: CalendarDay) -> Self {
        let noon = day.date().and_hms_opt(12, 0, 0).unwrap_or_default();
        Self::new(DateTime::from_naive_utc_and_offset(noon, Utc))
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Moves the clock to noon UTC on `day`.
    pub fn set_day(&self, day: CalendarDay) {
        let noon = day.date().and_hms_opt(12, 0, 0).unwrap_or_default();
        self.set(DateTime::from_naive_utc_and_offset(noon, Utc));
    }

    /// Moves the clock forward (or back, if negative) by whole days.
    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += Duration::days(days);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn day_of(&self, timestamp: DateTime<Utc>) -> CalendarDay {
        CalendarDay(timestamp.date_naive())
    }
}
