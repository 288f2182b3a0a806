use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::error::PortalError;

/// UTC offset of America/Mexico_City (no DST since October 2022).
pub const MEXICO_CITY_OFFSET_MINUTES: i32 = -360;

/// ISO-8601 week in which a payment is made.
///
/// Ordered chronologically: by year first, then week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaymentWeek {
    year: i32,
    week: u32,
}

impl PaymentWeek {
    /// Earliest year accepted from user input.
    pub const MIN_YEAR: i32 = 2000;
    /// Latest year accepted from user input.
    pub const MAX_YEAR: i32 = 2100;

    /// Validate a user-supplied `(week, year)` pair.
    ///
    /// Week 53 is accepted for every year; [`monday_of`] extends week 52 by
    /// seven days for years that have no 53rd week.
    pub fn new(week: u32, year: i32) -> Result<Self, PortalError> {
        if !(1..=53).contains(&week) {
            return Err(PortalError::InvalidWeek {
                week,
                year,
                reason: "week must be between 1 and 53".into(),
            });
        }
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(PortalError::InvalidWeek {
                week,
                year,
                reason: format!(
                    "year must be between {} and {}",
                    Self::MIN_YEAR,
                    Self::MAX_YEAR
                ),
            });
        }
        Ok(Self { year, week })
    }

    /// ISO week number (1..=53).
    pub fn week(&self) -> u32 {
        self.week
    }

    /// ISO week-year (may differ from the calendar year near January 1st).
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The following ISO week.
    pub fn next(&self) -> Self {
        week_of(shift(monday_of(*self), 7))
    }
}

impl std::fmt::Display for PaymentWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// ISO week and week-year of a civil date.
///
/// ISO weeks are keyed by their Thursday: the date is moved to the Thursday
/// of its own Monday-based week and the week number is counted from January
/// 1st of that Thursday's year. Sunday is day 7, so it belongs to the week
/// that started the Monday before.
pub fn week_of(date: NaiveDate) -> PaymentWeek {
    let weekday = i64::from(date.weekday().number_from_monday());
    let thursday = shift(date, 4 - weekday);
    PaymentWeek {
        year: thursday.year(),
        week: (thursday.ordinal() - 1) / 7 + 1,
    }
}

/// Monday of an ISO week.
///
/// January 4th always falls in ISO week 1; back up to its Monday and add
/// whole weeks. Week 53 is simply week 1 plus 52 weeks, whether or not the
/// year actually has one.
pub fn monday_of(week: PaymentWeek) -> NaiveDate {
    let jan4 = NaiveDate::from_ymd_opt(week.year, 1, 4).unwrap_or(NaiveDate::MAX);
    let back = i64::from(jan4.weekday().num_days_from_monday());
    shift(jan4, i64::from(week.week.saturating_sub(1)) * 7 - back)
}

/// Add `days` to a date, saturating at the edges of the calendar range.
pub(crate) fn shift(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(TimeDelta::days(days))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Wall clock pinned to the issuing jurisdiction's civil time.
///
/// Only [`WeekClock::now`] reads the system clock; every other operation is
/// a pure function of its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekClock {
    offset: FixedOffset,
}

impl Default for WeekClock {
    fn default() -> Self {
        Self::mexico_city()
    }
}

impl WeekClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Central Mexico civil time (UTC-6).
    pub fn mexico_city() -> Self {
        Self::new(FixedOffset::west_opt(6 * 3600).unwrap_or_else(|| Utc.fix()))
    }

    /// Build from a signed offset in minutes east of UTC (e.g. `-360`).
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, PortalError> {
        FixedOffset::east_opt(minutes * 60)
            .map(Self::new)
            .ok_or_else(|| PortalError::Config(format!("UTC offset {minutes} minutes is out of range")))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current instant expressed in local civil time.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Interpret a naive local timestamp in this clock's zone.
    pub fn localize(&self, local: NaiveDateTime) -> DateTime<FixedOffset> {
        DateTime::from_naive_utc_and_offset(local - self.offset, self.offset)
    }

    /// Civil date of an instant in this zone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// ISO week of an instant, evaluated on its local civil date.
    pub fn week_of_instant(&self, instant: DateTime<Utc>) -> PaymentWeek {
        week_of(self.local_date(instant))
    }
}
